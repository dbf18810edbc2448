use std::time::Duration;
use thiserror::Error;

/// Failures a caller can see when talking to the timer worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// The worker has terminated, or quit before answering.
    #[error("timer worker is not running")]
    NotRunning,

    /// The worker did not answer a blocking command in time.
    #[error("timer worker did not reply within {0:?}")]
    ReplyTimeout(Duration),

    /// The worker answered with a reply of the wrong kind.
    #[error("unexpected reply from timer worker: {0}")]
    UnexpectedReply(String),
}

pub type Result<T> = std::result::Result<T, WorkerError>;
