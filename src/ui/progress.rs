//! Terminal progress bar fed by progress events.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

use crate::progress::{ProgressEvent, ProgressSink};

use super::OutputMode;

const BAR_TEMPLATE: &str = "{spinner:.magenta} [{bar:30.magenta/dim}] {pos:>3}% {msg}";

/// Draws [`ProgressEvent`]s on stderr with indicatif.
///
/// Clones share the same bar, so one clone can be handed to the
/// orchestrator as a sink while the caller keeps another to finish it.
#[derive(Clone)]
pub struct TerminalProgress {
    bar: ProgressBar,
    echo_lines: bool,
}

impl TerminalProgress {
    /// Create a progress display for the given output mode.
    ///
    /// Quiet and silent modes get a hidden bar.
    pub fn new(mode: OutputMode) -> Self {
        if !mode.shows_progress_bar() {
            return Self::hidden();
        }

        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .progress_chars("█▓░"),
        );
        bar.enable_steady_tick(Duration::from_millis(80));

        Self {
            bar,
            echo_lines: mode.shows_progress_lines(),
        }
    }

    /// A display that draws nothing.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::hidden()),
            echo_lines: false,
        }
    }

    /// Current bar position, 0 to 100.
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Current bar message.
    pub fn message(&self) -> String {
        self.bar.message()
    }

    /// Remove the bar from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for TerminalProgress {
    fn emit(&self, event: ProgressEvent) {
        self.bar.set_position(u64::from(event.progress));
        self.bar.set_message(bar_message(&event));
        if self.echo_lines {
            self.bar.println(event.to_string());
        }
    }
}

fn bar_message(event: &ProgressEvent) -> String {
    let mut msg = event.message.clone();
    if let Some(milestone) = &event.milestone {
        msg.push_str(&format!(" ({})", milestone));
    }
    if let Some(elapsed) = &event.elapsed {
        msg.push_str(&format!(" [{}]", elapsed));
    }
    msg
}
