//! Inter-process communication between kairos and kairosctl
//!
//! We use Unix domain sockets for local IPC. Every exchange is one JSON
//! request line answered by one JSON response line.

use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// A command addressed to the timer worker by name.
///
/// `args` is free-form; the daemon decodes it per command. `block` asks the
/// daemon to wait for the worker's reply instead of answering `Ok` as soon
/// as the command is queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
    #[serde(default)]
    pub block: bool,
}

impl Request {
    pub fn new(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            args,
            block: false,
        }
    }

    /// Request without arguments.
    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, serde_json::Value::Null)
    }

    pub fn blocking(mut self) -> Self {
        self.block = true;
        self
    }
}

/// Responses from kairos back to kairosctl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Ok,
    Tasks(Vec<String>),
    /// Index of the selected task, `-1` when none is selected.
    CurrentTask(i64),
    Enabled(bool),
    State(String),
    Status(TimerStatus),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerStatus {
    pub state: TimerState,
    pub current_task: i64,
    pub work_streak: u32,
    pub elapsed: u64, // seconds
    pub total: u64,   // seconds, 0 while idle
    pub entered_at: Option<DateTime<Local>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerState {
    #[default]
    Idle,
    Working,
    Resting,
    LongResting,
}

impl TimerState {
    pub fn is_idle(self) -> bool {
        self == TimerState::Idle
    }
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerState::Idle => "Idle",
            TimerState::Working => "Working",
            TimerState::Resting => "Resting",
            TimerState::LongResting => "Long Resting",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection refused - is kairos running?")]
    ConnectionRefused,

    #[error("Connection closed before a response arrived")]
    Closed,

    #[error("Message longer than {0} bytes")]
    TooLarge(u64),
}

pub const SOCKET_PATH: &str = "/tmp/kairos.sock";

/// Longest accepted message line, newline included.
pub const MAX_MESSAGE_BYTES: u64 = 1024 * 1024;

/// Write one message as a single JSON line.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), IpcError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one JSON line. `Ok(None)` means the peer closed the stream.
///
/// Lines longer than [`MAX_MESSAGE_BYTES`] fail with [`IpcError::TooLarge`];
/// the stream is out of sync afterwards and should be dropped.
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>, IpcError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    let mut limited = reader.take(MAX_MESSAGE_BYTES);
    let read = limited.read_line(&mut line).await?;
    if read == 0 {
        return Ok(None);
    }
    if !line.ends_with('\n') && read as u64 >= MAX_MESSAGE_BYTES {
        return Err(IpcError::TooLarge(MAX_MESSAGE_BYTES));
    }
    Ok(Some(serde_json::from_str(line.trim_end())?))
}
