//! Kairos: a background Pomodoro task timer.
//!
//! A single [`Worker`] task owns the task list and the work/rest automaton.
//! Everything else talks to it through a [`CommandSender`], either in
//! process or over the Unix socket served by [`ipc::server`].

pub mod automaton;
pub mod channel;
pub mod command;
pub mod config;
pub mod error;
pub mod ipc;
pub mod notifier;
pub mod worker;

pub use channel::{command_channel, CommandReceiver, CommandSender};
pub use command::{Command, Reply};
pub use config::{Config, TimerConfig};
pub use error::WorkerError;
pub use kairos_ipc::{TimerState, TimerStatus};
pub use notifier::{Notifier, NotifierKind};
pub use worker::{Worker, WorkerHandle};
