//! Terminal UI.

use console::{style, Term};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use std::io::Write;
use std::sync::Arc;

use crate::error::{PreflightError, Result};
use crate::progress::ProgressSink;

use super::{OutputMode, PreflightTheme, TerminalProgress, UserInterface};

/// Terminal UI writing to stdout, with prompts when interactive.
pub struct TerminalUI {
    term: Term,
    theme: PreflightTheme,
    mode: OutputMode,
    interactive: bool,
    progress: Option<TerminalProgress>,
}

impl TerminalUI {
    pub fn new(mode: OutputMode, interactive: bool) -> Self {
        Self {
            term: Term::stdout(),
            theme: PreflightTheme::detect(),
            mode,
            interactive,
            progress: None,
        }
    }
}

/// Create a terminal UI. Prompts only appear when `interactive` is set
/// and stdout is a terminal.
pub fn create_ui(interactive: bool, mode: OutputMode) -> Box<dyn UserInterface> {
    Box::new(TerminalUI::new(mode, interactive))
}

/// Dialoguer theme without the default yellow `?` prefix.
fn prompt_theme() -> ColorfulTheme {
    ColorfulTheme {
        prompt_prefix: style("".to_string()),
        ..ColorfulTheme::default()
    }
}

impl UserInterface for TerminalUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn theme(&self) -> &PreflightTheme {
        &self.theme
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", msg).ok();
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_success(msg)).ok();
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_warning(msg)).ok();
        }
    }

    fn error(&mut self, msg: &str) {
        writeln!(self.term, "{}", self.theme.format_error(msg)).ok();
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "\n{}\n", self.theme.format_header(title)).ok();
        }
    }

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        if !self.is_interactive() {
            return Ok(default);
        }
        Confirm::with_theme(&prompt_theme())
            .with_prompt(question)
            .default(default)
            .interact_on(&self.term)
            .map_err(|e| PreflightError::Io(e.into()))
    }

    fn start_progress(&mut self) -> Arc<dyn ProgressSink> {
        self.finish_progress();
        let progress = TerminalProgress::new(self.mode);
        self.progress = Some(progress.clone());
        Arc::new(progress)
    }

    fn finish_progress(&mut self) {
        if let Some(progress) = self.progress.take() {
            progress.finish();
        }
    }

    fn is_interactive(&self) -> bool {
        self.interactive && self.term.is_term()
    }
}

impl Drop for TerminalUI {
    fn drop(&mut self) {
        self.finish_progress();
    }
}
