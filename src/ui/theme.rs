//! Visual theme and styling.

use console::Style;

use crate::prerequisites::PrerequisiteStatus;

/// Preflight's visual theme.
#[derive(Debug, Clone)]
pub struct PreflightTheme {
    /// Installed prerequisites (green).
    pub success: Style,
    /// Optional prerequisites that are missing (orange).
    pub warning: Style,
    /// Required prerequisites that are missing (red bold).
    pub error: Style,
    /// Progress bar and spinner accents (magenta).
    pub info: Style,
    /// Secondary text such as versions and commands.
    pub dim: Style,
    /// Prerequisite names.
    pub highlight: Style,
    /// Section headers.
    pub header: Style,
}

impl Default for PreflightTheme {
    fn default() -> Self {
        Self::new()
    }
}

impl PreflightTheme {
    /// Create the default colored theme.
    pub fn new() -> Self {
        Self {
            success: Style::new().green(),
            warning: Style::new().color256(208),
            error: Style::new().red().bold(),
            info: Style::new().magenta(),
            dim: Style::new().dim(),
            highlight: Style::new().bold(),
            header: Style::new().bold().magenta(),
        }
    }

    /// Create a theme without colors (for non-TTY or --no-color).
    pub fn plain() -> Self {
        Self {
            success: Style::new(),
            warning: Style::new(),
            error: Style::new(),
            info: Style::new(),
            dim: Style::new(),
            highlight: Style::new(),
            header: Style::new(),
        }
    }

    /// Pick the colored or plain theme for the current terminal.
    pub fn detect() -> Self {
        if should_use_colors() {
            Self::new()
        } else {
            Self::plain()
        }
    }

    pub fn format_success(&self, msg: &str) -> String {
        format!("{}", self.success.apply_to(format!("✓ {}", msg)))
    }

    pub fn format_warning(&self, msg: &str) -> String {
        format!("{}", self.warning.apply_to(format!("⚠ {}", msg)))
    }

    pub fn format_error(&self, msg: &str) -> String {
        format!("{}", self.error.apply_to(format!("✗ {}", msg)))
    }

    pub fn format_skipped(&self, msg: &str) -> String {
        format!("{}", self.dim.apply_to(format!("○ {}", msg)))
    }

    /// Format a header banner.
    pub fn format_header(&self, title: &str) -> String {
        format!(
            "{} {}",
            self.header.apply_to("▲"),
            self.highlight.apply_to(title)
        )
    }

    /// Status cell for a prerequisite: installed, missing, or optional.
    ///
    /// Installed prerequisites with a missing plugin show as incomplete.
    pub fn format_status(&self, status: &PrerequisiteStatus) -> String {
        if status.is_complete() {
            return self.format_success("installed");
        }
        if status.installed {
            let missing: Vec<&str> = status
                .missing_plugins()
                .iter()
                .map(|p| p.name.as_str())
                .collect();
            return self.format_warning(&format!("missing plugin {}", missing.join(", ")));
        }
        if !status.verification.is_verified() {
            return self.format_warning("undetermined");
        }
        if status.optional {
            self.format_skipped("missing (optional)")
        } else {
            self.format_error("missing")
        }
    }
}

/// Check if colors should be enabled.
pub fn should_use_colors() -> bool {
    // https://no-color.org/
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    console::Term::stdout().is_term()
}
