//! Remote command execution for the storefleet dokku provider.
//!
//! A [`RemoteChannel`] runs one shell command on a remote host and returns its
//! exit status together with the combined stdout/stderr. The production
//! channel drives the system `ssh` client with strict host-key checking; the
//! scripted channel replays canned responses for tests.

pub mod cancel;
pub mod config;
pub mod mock;
pub mod ssh;

pub use cancel::CancelToken;
pub use config::{SshConfig, SshIdentity};
pub use mock::ScriptedChannel;
pub use ssh::SshChannel;

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("remote config error: {0}")]
    Config(String),
    #[error("failed to start '{program}': {reason}")]
    Spawn { program: String, reason: String },
    #[error("remote command `{command}` timed out after {}ms", elapsed.as_millis())]
    Timeout { command: String, elapsed: Duration },
    #[error("remote command `{command}` was cancelled")]
    Cancelled { command: String },
}

/// Exit status and combined output of one remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `-1` when the remote end closed without reporting a status.
    pub status: i32,
    pub output: String,
}

impl CommandOutput {
    pub fn new(status: i32, output: impl Into<String>) -> Self {
        Self {
            status,
            output: output.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// A channel able to execute shell commands on one remote host.
///
/// Implementations are created once and shared between concurrent
/// provisioning runs.
pub trait RemoteChannel: Send + Sync {
    /// Run `command` to completion unless `cancel` fires first.
    ///
    /// A non-zero exit is not an error: callers inspect
    /// [`CommandOutput::status`]. Errors are reserved for failures to run the
    /// command at all, deadlines and cancellation.
    fn execute_with(&self, command: &str, cancel: &CancelToken)
        -> Result<CommandOutput, RemoteError>;

    /// Run `command` with nothing able to cancel it.
    fn execute(&self, command: &str) -> Result<CommandOutput, RemoteError> {
        self.execute_with(command, &CancelToken::new())
    }

    /// Human-readable destination, used in logs.
    fn destination(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_zero_status() {
        assert!(CommandOutput::new(0, "").success());
        assert!(!CommandOutput::new(1, "boom").success());
        assert!(!CommandOutput::new(-1, "").success());
    }

    #[test]
    fn timeout_message_names_command() {
        let err = RemoteError::Timeout {
            command: "apps:list".to_owned(),
            elapsed: Duration::from_secs(600),
        };
        assert_eq!(
            err.to_string(),
            "remote command `apps:list` timed out after 600000ms"
        );
    }
}
