//! Command mailbox between callers and the timer worker.
//!
//! Any number of [`CommandSender`] clones feed one [`CommandReceiver`].
//! Commands that need an answer carry a oneshot reply slot, so every
//! blocking caller waits on its own reply and replies can never be
//! delivered to the wrong caller.

use crate::command::{Command, Reply};
use crate::error::{Result, WorkerError};
use kairos_ipc::TimerStatus;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// A queued command plus, for blocking callers, where to put the answer.
#[derive(Debug)]
pub struct Envelope {
    pub command: Command,
    reply: Option<oneshot::Sender<Reply>>,
}

impl Envelope {
    pub fn expects_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Split into the command and its reply slot.
    pub fn into_parts(self) -> (Command, Option<oneshot::Sender<Reply>>) {
        (self.command, self.reply)
    }
}

/// Outcome of [`CommandReceiver::receive_with_timeout`].
#[derive(Debug)]
pub enum Received {
    Command(Envelope),
    TimedOut,
    /// Every sender is gone; nothing will ever arrive.
    Closed,
}

#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<Envelope>,
    reply_timeout: Duration,
}

#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

pub fn command_channel(reply_timeout: Duration) -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandSender { tx, reply_timeout }, CommandReceiver { rx })
}

impl CommandSender {
    /// Whether a worker is still draining this channel.
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    pub fn reply_timeout(&self) -> Duration {
        self.reply_timeout
    }

    /// Resolves once the worker has stopped draining the channel.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    /// Queue a command without waiting for it to be handled.
    pub fn send(&self, command: Command) -> Result<()> {
        self.enqueue(Envelope {
            command,
            reply: None,
        })
    }

    /// Queue a command and wait, up to the reply timeout, for its answer.
    pub async fn send_and_await(&self, command: Command) -> Result<Reply> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.enqueue(Envelope {
            command,
            reply: Some(reply_tx),
        })?;

        match tokio::time::timeout(self.reply_timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            // Reply slot dropped unanswered: the worker quit with our command queued.
            Ok(Err(_)) => Err(WorkerError::NotRunning),
            Err(_) => Err(WorkerError::ReplyTimeout(self.reply_timeout)),
        }
    }

    fn enqueue(&self, envelope: Envelope) -> Result<()> {
        if !self.is_alive() {
            return Err(WorkerError::NotRunning);
        }
        debug!(command = envelope.command.name(), "queueing command");
        self.tx.send(envelope).map_err(|_| WorkerError::NotRunning)
    }
}

// Typed shortcuts for in-process callers.
impl CommandSender {
    pub fn set_tasks(&self, tasks: Vec<String>) -> Result<()> {
        self.send(Command::SetTasks(tasks))
    }

    pub async fn tasks(&self) -> Result<Vec<String>> {
        match self.send_and_await(Command::GetTasks).await? {
            Reply::Tasks(tasks) => Ok(tasks),
            other => Err(unexpected(other)),
        }
    }

    pub async fn current_task(&self) -> Result<Option<usize>> {
        match self.send_and_await(Command::GetCurrentTask).await? {
            Reply::CurrentTask(index) => Ok(index),
            other => Err(unexpected(other)),
        }
    }

    pub fn start_timer(&self, index: Option<usize>) -> Result<()> {
        self.send(Command::StartTimer(index))
    }

    pub fn stop_timer(&self) -> Result<()> {
        self.send(Command::StopTimer)
    }

    pub fn switch_task(&self, index: usize) -> Result<()> {
        self.send(Command::SwitchTask(index))
    }

    pub async fn timer_enabled(&self) -> Result<bool> {
        match self.send_and_await(Command::TimerEnabled).await? {
            Reply::Enabled(enabled) => Ok(enabled),
            other => Err(unexpected(other)),
        }
    }

    pub async fn state(&self) -> Result<String> {
        match self.send_and_await(Command::GetState).await? {
            Reply::State(state) => Ok(state),
            other => Err(unexpected(other)),
        }
    }

    pub async fn status(&self) -> Result<TimerStatus> {
        match self.send_and_await(Command::GetStatus).await? {
            Reply::Status(status) => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    /// Work on `index` right away: switch to it if the timer is running,
    /// start the timer on it otherwise.
    pub async fn start_task(&self, index: usize) -> Result<()> {
        if self.timer_enabled().await? {
            self.switch_task(index)
        } else {
            self.start_timer(Some(index))
        }
    }
}

fn unexpected(reply: Reply) -> WorkerError {
    WorkerError::UnexpectedReply(format!("{reply:?}"))
}

impl CommandReceiver {
    /// Pop the next command if one is already queued.
    pub fn try_receive(&mut self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next command.
    pub async fn receive_with_timeout(&mut self, timeout: Duration) -> Received {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(envelope)) => Received::Command(envelope),
            Ok(None) => Received::Closed,
            Err(_) => Received::TimedOut,
        }
    }
}
