//! Progress events.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Position within a counted sequence, e.g. "checking 2 of 5".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Milestone {
    pub current: usize,
    pub total: usize,
}

impl Milestone {
    pub fn new(current: usize, total: usize) -> Self {
        Self { current, total }
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.current, self.total)
    }
}

/// One progress report for an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    /// Label of the operation being tracked
    pub operation: String,

    /// Overall completion, 0 to 100
    pub progress: u8,

    /// What is happening now
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<Milestone>,

    /// Human-readable elapsed time, present once the operation is slow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<String>,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:>3}%] {}", self.progress, self.message)?;
        if let Some(milestone) = &self.milestone {
            write!(f, " ({})", milestone)?;
        }
        if let Some(elapsed) = &self.elapsed {
            write!(f, " [{}]", elapsed)?;
        }
        Ok(())
    }
}

/// Format a duration as `45s`, `1m 15s`, or `1h 2m 3s`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
