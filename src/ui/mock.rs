//! Mock UI implementation for testing.
//!
//! `MockUI` captures every message and progress event for later
//! assertion, and answers confirmations from a queue.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::Result;
use crate::progress::{ProgressSink, RecordingSink};

use super::{OutputMode, PreflightTheme, UserInterface};

/// Mock UI implementation for testing.
#[derive(Debug, Default)]
pub struct MockUI {
    mode: OutputMode,
    theme: PreflightTheme,
    interactive: bool,
    messages: Vec<String>,
    successes: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    headers: Vec<String>,
    confirm_responses: VecDeque<bool>,
    confirms_shown: Vec<String>,
    progress: RecordingSink,
    progress_started: usize,
}

impl MockUI {
    pub fn new() -> Self {
        Self {
            theme: PreflightTheme::plain(),
            ..Default::default()
        }
    }

    pub fn with_mode(mode: OutputMode) -> Self {
        Self {
            mode,
            ..Self::new()
        }
    }

    /// Queue answers for upcoming confirmations.
    ///
    /// Once the queue is empty, confirmations return their default.
    pub fn queue_confirms(&mut self, responses: &[bool]) {
        self.confirm_responses.extend(responses);
    }

    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn successes(&self) -> &[String] {
        &self.successes
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Questions asked through `confirm`.
    pub fn confirms_shown(&self) -> &[String] {
        &self.confirms_shown
    }

    /// Every progress event emitted to sinks from `start_progress`.
    pub fn progress(&self) -> &RecordingSink {
        &self.progress
    }

    /// How many progress displays were started.
    pub fn progress_started(&self) -> usize {
        self.progress_started
    }

    pub fn has_message(&self, msg: &str) -> bool {
        self.messages.iter().any(|m| m.contains(msg))
    }

    pub fn has_success(&self, msg: &str) -> bool {
        self.successes.iter().any(|m| m.contains(msg))
    }

    pub fn has_warning(&self, msg: &str) -> bool {
        self.warnings.iter().any(|m| m.contains(msg))
    }

    pub fn has_error(&self, msg: &str) -> bool {
        self.errors.iter().any(|m| m.contains(msg))
    }
}

impl UserInterface for MockUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn theme(&self) -> &PreflightTheme {
        &self.theme
    }

    fn message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn success(&mut self, msg: &str) {
        self.successes.push(msg.to_string());
    }

    fn warning(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    fn show_header(&mut self, title: &str) {
        self.headers.push(title.to_string());
    }

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        self.confirms_shown.push(question.to_string());
        Ok(self.confirm_responses.pop_front().unwrap_or(default))
    }

    fn start_progress(&mut self) -> Arc<dyn ProgressSink> {
        self.progress_started += 1;
        Arc::new(self.progress.clone())
    }

    fn finish_progress(&mut self) {}

    fn is_interactive(&self) -> bool {
        self.interactive
    }
}
