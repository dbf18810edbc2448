//! Outbound status notifications.
//!
//! The worker only ever calls [`Notifier::notify`]. Implementations must
//! return promptly and keep their own failures to themselves.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

pub trait Notifier: Send + Sync + fmt::Debug {
    fn notify(&self, message: &str);
}

/// Writes notifications to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        info!(target: "kairos::notify", "{}", message);
    }
}

/// Desktop notifications through the platform notification service.
#[derive(Debug)]
pub struct DesktopNotifier {
    summary: String,
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self {
            summary: "Kairos".to_string(),
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, message: &str) {
        let summary = self.summary.clone();
        let body = message.to_string();
        // Talking to the notification daemon can stall, keep it off the worker.
        let spawned = std::thread::Builder::new()
            .name("kairos-notify".to_string())
            .spawn(move || {
                if let Err(e) = notify_rust::Notification::new()
                    .summary(&summary)
                    .body(&body)
                    .appname("kairos")
                    .show()
                {
                    warn!("Failed to send notification: {}", e);
                }
            });
        if let Err(e) = spawned {
            warn!("Failed to spawn notification thread: {}", e);
        }
    }
}

/// Runs a user supplied shell command with the message as its last argument.
#[derive(Debug)]
pub struct CommandNotifier {
    command: String,
}

impl CommandNotifier {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, message: &str) {
        // The message travels as a positional parameter so it is never
        // interpreted by the shell.
        let script = format!("{} \"$1\"", self.command);
        let spawned = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&script)
            .arg("kairos")
            .arg(message)
            .stdin(std::process::Stdio::null())
            .spawn();
        // Dropping the child leaves reaping to the runtime.
        if let Err(e) = spawned {
            warn!("Failed to run notify command {:?}: {}", self.command, e);
        }
    }
}

/// Notifier selection as written in the config file or sent over IPC.
///
/// Serialized as `"none"`, `"log"`, `"desktop"` or `{ command = "..." }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifierKind {
    None,
    #[default]
    Log,
    Desktop,
    Command(String),
}

impl NotifierKind {
    pub fn build(&self) -> Option<Arc<dyn Notifier>> {
        match self {
            NotifierKind::None => None,
            NotifierKind::Log => Some(Arc::new(LogNotifier)),
            NotifierKind::Desktop => Some(Arc::new(DesktopNotifier::default())),
            NotifierKind::Command(command) => Some(Arc::new(CommandNotifier::new(command.clone()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_from_json() {
        let kind: NotifierKind = serde_json::from_str(r#""desktop""#).unwrap();
        assert_eq!(kind, NotifierKind::Desktop);
        let kind: NotifierKind = serde_json::from_str(r#"{"command":"notify-send"}"#).unwrap();
        assert_eq!(kind, NotifierKind::Command("notify-send".to_string()));
    }

    #[test]
    fn none_builds_nothing() {
        assert!(NotifierKind::None.build().is_none());
        assert!(NotifierKind::default().build().is_some());
    }

    #[tokio::test]
    async fn command_notifier_passes_message_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let notifier = CommandNotifier::new(format!("printf '%s' > '{}'", out.display()));
        notifier.notify("Working -> Resting; $(echo oops)");

        let mut written = String::new();
        for _ in 0..100 {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            written = std::fs::read_to_string(&out).unwrap_or_default();
            if !written.is_empty() {
                break;
            }
        }
        assert_eq!(written, "Working -> Resting; $(echo oops)");
    }
}
