//! Terminal user interface for the CLI.
//!
//! This module provides:
//! - [`UserInterface`] trait so commands can run against a mock in tests
//! - [`TerminalUI`] for real terminals, interactive or not
//! - A progress bar that doubles as a [`ProgressSink`], and a table renderer
//!
//! # Example
//!
//! ```
//! use preflight::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.success("git installed");
//! assert!(ui.has_success("git"));
//! ```

pub mod mock;
pub mod output;
pub mod progress;
pub mod table;
pub mod terminal;
pub mod theme;

pub use mock::MockUI;
pub use output::OutputMode;
pub use progress::TerminalProgress;
pub use table::Table;
pub use terminal::{create_ui, TerminalUI};
pub use theme::{should_use_colors, PreflightTheme};

use std::sync::Arc;

use crate::error::Result;
use crate::progress::ProgressSink;

/// Trait for user interface interactions.
pub trait UserInterface {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// The theme used to style table cells.
    fn theme(&self) -> &PreflightTheme;

    /// Display a plain line.
    fn message(&mut self, msg: &str);

    fn success(&mut self, msg: &str);

    fn warning(&mut self, msg: &str);

    /// Display an error. Shown in every output mode.
    fn error(&mut self, msg: &str);

    /// Show a header/banner.
    fn show_header(&mut self, title: &str);

    /// Ask a yes/no question. Non-interactive sessions get `default`.
    fn confirm(&mut self, question: &str, default: bool) -> Result<bool>;

    /// Start a progress display and return the sink that feeds it.
    fn start_progress(&mut self) -> Arc<dyn ProgressSink>;

    /// Clear the progress display started last.
    fn finish_progress(&mut self);

    /// Check if running in interactive mode.
    fn is_interactive(&self) -> bool;
}
