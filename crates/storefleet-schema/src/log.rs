//! Structured provisioning audit trail.
//!
//! Entries are kept typed while a pipeline runs and are rendered to the
//! newline-delimited `[Step k/N] -TAG- message` text only when handed to a
//! caller.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepTag {
    Progress,
    Completed,
    Failed,
}

impl fmt::Display for StepTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepTag::Progress => "PROGRESS",
            StepTag::Completed => "COMPLETED",
            StepTag::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub index: usize,
    pub total: usize,
    pub tag: StepTag,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Step {}/{}] -{}- {}",
            self.index, self.total, self.tag, self.message
        )
    }
}

/// Append-only list of step entries for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningLog {
    total: usize,
    entries: Vec<LogEntry>,
}

impl ProvisioningLog {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            entries: Vec::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn push(&mut self, index: usize, tag: StepTag, message: impl Into<String>) {
        self.entries.push(LogEntry {
            index,
            total: self.total,
            tag,
            message: message.into(),
        });
    }

    pub fn progress(&mut self, index: usize, message: impl Into<String>) {
        self.push(index, StepTag::Progress, message);
    }

    pub fn completed(&mut self, index: usize, message: impl Into<String>) {
        self.push(index, StepTag::Completed, message);
    }

    pub fn failed(&mut self, index: usize, message: impl Into<String>) {
        self.push(index, StepTag::Failed, message);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    pub fn has_failure(&self) -> bool {
        self.entries.iter().any(|e| e.tag == StepTag::Failed)
    }

    pub fn count(&self, tag: StepTag) -> usize {
        self.entries.iter().filter(|e| e.tag == tag).count()
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ProvisioningLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}
