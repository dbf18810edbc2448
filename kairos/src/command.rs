//! Typed commands understood by the timer worker.
//!
//! In-process callers build [`Command`] values directly. Requests arriving
//! over the socket are decoded by name with [`Command::from_request`]; names
//! the worker does not know and arguments it cannot use become the explicit
//! [`Command::Unknown`] and [`Command::Invalid`] variants, which the worker
//! reports and otherwise ignores.

use crate::notifier::{Notifier, NotifierKind};
use kairos_ipc::{Request, Response, TimerStatus};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Command {
    SetTasks(Vec<String>),
    GetTasks,
    GetCurrentTask,
    /// Minutes.
    SetWorkPeriod(u64),
    /// Minutes.
    SetRestPeriod(u64),
    /// Minutes.
    SetLongRestPeriod(u64),
    SetMaxWorkStreak(u32),
    SetProgressSymbol(String),
    SetSquashSymbol(String),
    SetNotifier(Option<Arc<dyn Notifier>>),
    /// Task index to work on; `None` means the first task.
    StartTimer(Option<usize>),
    StopTimer,
    TimerEnabled,
    SwitchTask(usize),
    GetState,
    GetStatus,
    Quit,
    Unknown { name: String },
    Invalid { name: String, reason: String },
}

/// Answer to a command sent with a reply slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The command has no result of its own.
    Ack,
    Tasks(Vec<String>),
    CurrentTask(Option<usize>),
    Enabled(bool),
    State(String),
    Status(TimerStatus),
}

impl Command {
    /// Wire name of the command.
    pub fn name(&self) -> &str {
        match self {
            Command::SetTasks(_) => "set_tasks",
            Command::GetTasks => "get_tasks",
            Command::GetCurrentTask => "get_current_task",
            Command::SetWorkPeriod(_) => "set_work_period",
            Command::SetRestPeriod(_) => "set_rest_period",
            Command::SetLongRestPeriod(_) => "set_long_rest_period",
            Command::SetMaxWorkStreak(_) => "set_max_work_streak",
            Command::SetProgressSymbol(_) => "set_progress_symbol",
            Command::SetSquashSymbol(_) => "set_squash_symbol",
            Command::SetNotifier(_) => "set_adaptor",
            Command::StartTimer(_) => "start_timer",
            Command::StopTimer => "stop_timer",
            Command::TimerEnabled => "timer_enabled",
            Command::SwitchTask(_) => "switch_task",
            Command::GetState => "get_state",
            Command::GetStatus => "get_status",
            Command::Quit => "quit",
            Command::Unknown { name } | Command::Invalid { name, .. } => name.as_str(),
        }
    }

    pub fn from_request(request: &Request) -> Command {
        let name = request.name.as_str();
        let args = &request.args;
        let decoded = match name {
            "set_tasks" => decode_tasks(args).map(Command::SetTasks),
            "get_tasks" => Ok(Command::GetTasks),
            "get_current_task" | "get_cur_task" => Ok(Command::GetCurrentTask),
            "set_work_period" => decode_minutes(args).map(Command::SetWorkPeriod),
            "set_rest_period" => decode_minutes(args).map(Command::SetRestPeriod),
            "set_long_rest_period" => decode_minutes(args).map(Command::SetLongRestPeriod),
            "set_max_work_streak" => decode_minutes(args)
                .and_then(|n| u32::try_from(n).map_err(|_| format!("{n} is too large")))
                .map(Command::SetMaxWorkStreak),
            "set_progress_symbol" => decode_symbol(args).map(Command::SetProgressSymbol),
            "set_squash_symbol" => args
                .as_str()
                .map(|s| Command::SetSquashSymbol(s.to_string()))
                .ok_or_else(|| format!("expected a string, got {args}")),
            "set_adaptor" | "set_notifier" => decode_notifier(args).map(Command::SetNotifier),
            "start_timer" => decode_start_index(args).map(Command::StartTimer),
            "stop_timer" => Ok(Command::StopTimer),
            "timer_enabled" => Ok(Command::TimerEnabled),
            "switch_task" => decode_index(args).map(Command::SwitchTask),
            "get_state" => Ok(Command::GetState),
            "get_status" => Ok(Command::GetStatus),
            "quit" => Ok(Command::Quit),
            _ => Ok(Command::Unknown {
                name: name.to_string(),
            }),
        };
        decoded.unwrap_or_else(|reason| Command::Invalid {
            name: name.to_string(),
            reason,
        })
    }
}

fn decode_tasks(args: &Value) -> std::result::Result<Vec<String>, String> {
    serde_json::from_value(args.clone()).map_err(|e| format!("expected a list of strings: {e}"))
}

fn decode_minutes(args: &Value) -> std::result::Result<u64, String> {
    match args.as_u64() {
        Some(0) => Err("must be positive".to_string()),
        Some(n) => Ok(n),
        None => Err(format!("expected a positive integer, got {args}")),
    }
}

fn decode_symbol(args: &Value) -> std::result::Result<String, String> {
    match args.as_str() {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(format!("expected a non-empty string, got {args}")),
    }
}

fn decode_index(args: &Value) -> std::result::Result<usize, String> {
    args.as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| format!("expected a task index, got {args}"))
}

/// Integers select a task; anything else falls back to the first task.
fn decode_start_index(args: &Value) -> std::result::Result<Option<usize>, String> {
    if args.is_i64() || args.is_u64() {
        decode_index(args).map(Some)
    } else {
        Ok(None)
    }
}

fn decode_notifier(args: &Value) -> std::result::Result<Option<Arc<dyn Notifier>>, String> {
    if args.is_null() {
        return Ok(None);
    }
    let kind: NotifierKind = serde_json::from_value(args.clone())
        .map_err(|e| format!("expected a notifier kind: {e}"))?;
    Ok(kind.build())
}

impl From<Reply> for Response {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Ack => Response::Ok,
            Reply::Tasks(tasks) => Response::Tasks(tasks),
            Reply::CurrentTask(index) => Response::CurrentTask(index.map_or(-1, |i| i as i64)),
            Reply::Enabled(enabled) => Response::Enabled(enabled),
            Reply::State(state) => Response::State(state),
            Reply::Status(status) => Response::Status(status),
        }
    }
}
