use crate::{CancelToken, CommandOutput, RemoteChannel, RemoteError};
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Default)]
struct Script {
    queued: VecDeque<CommandOutput>,
    failing_prefixes: Vec<(String, CommandOutput)>,
    executed: Vec<String>,
    unreachable: bool,
}

/// Replays canned responses instead of contacting a host.
///
/// Responses are taken from the queue in order; once it is empty every
/// command succeeds and echoes `"<command>: ok\n"`. A prefix rule takes
/// precedence over the queue.
#[derive(Default)]
pub struct ScriptedChannel {
    script: Mutex<Script>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn respond(self, status: i32, output: &str) -> Self {
        if let Ok(mut s) = self.script.lock() {
            s.queued.push_back(CommandOutput::new(status, output));
        }
        self
    }

    #[must_use]
    pub fn fail_when(self, prefix: &str, status: i32, output: &str) -> Self {
        if let Ok(mut s) = self.script.lock() {
            s.failing_prefixes
                .push((prefix.to_owned(), CommandOutput::new(status, output)));
        }
        self
    }

    /// Every command fails as if the host could not be reached.
    #[must_use]
    pub fn unreachable(self) -> Self {
        if let Ok(mut s) = self.script.lock() {
            s.unreachable = true;
        }
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.script
            .lock()
            .map(|s| s.executed.clone())
            .unwrap_or_default()
    }
}

impl RemoteChannel for ScriptedChannel {
    fn execute_with(
        &self,
        command: &str,
        cancel: &CancelToken,
    ) -> Result<CommandOutput, RemoteError> {
        if cancel.is_cancelled() {
            return Err(RemoteError::Cancelled {
                command: command.to_owned(),
            });
        }
        let mut s = self
            .script
            .lock()
            .map_err(|e| RemoteError::Config(format!("script poisoned: {e}")))?;
        if s.unreachable {
            return Err(RemoteError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "scripted host unreachable",
            )));
        }
        s.executed.push(command.to_owned());
        if let Some((_, out)) = s
            .failing_prefixes
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
        {
            return Ok(out.clone());
        }
        Ok(s
            .queued
            .pop_front()
            .unwrap_or_else(|| CommandOutput::new(0, format!("{command}: ok\n"))))
    }

    fn destination(&self) -> String {
        "scripted".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_then_default() {
        let ch = ScriptedChannel::new().respond(1, "nope\n");
        assert_eq!(ch.execute("a").unwrap(), CommandOutput::new(1, "nope\n"));
        assert_eq!(ch.execute("b").unwrap(), CommandOutput::new(0, "b: ok\n"));
        assert_eq!(ch.executed(), vec!["a", "b"]);
    }

    #[test]
    fn prefix_rule_wins() {
        let ch = ScriptedChannel::new()
            .respond(0, "first\n")
            .fail_when("postgres:", 2, "db down\n");
        assert_eq!(ch.execute("postgres:create x").unwrap().status, 2);
        assert_eq!(ch.execute("apps:create x").unwrap().output, "first\n");
    }

    #[test]
    fn cancelled_token_runs_nothing() {
        let ch = ScriptedChannel::new();
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(
            ch.execute_with("apps:list", &token),
            Err(RemoteError::Cancelled { .. })
        ));
        assert!(ch.executed().is_empty());
    }

    #[test]
    fn unreachable_records_nothing() {
        let ch = ScriptedChannel::new().unreachable();
        assert!(ch.execute("apps:list").is_err());
        assert!(ch.executed().is_empty());
    }
}
