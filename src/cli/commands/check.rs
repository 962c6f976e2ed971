//! Check command implementation.
//!
//! The `preflight check` command reports which prerequisites are installed.
//! It exits with 1 when a required prerequisite is missing.

use async_trait::async_trait;
use std::sync::Arc;

use crate::cli::args::CheckArgs;
use crate::error::Result;
use crate::prerequisites::PrerequisiteManager;
use crate::progress::NullSink;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::display;

/// The check command implementation.
pub struct CheckCommand {
    manager: PrerequisiteManager,
    args: CheckArgs,
}

impl CheckCommand {
    pub fn new(manager: PrerequisiteManager, args: CheckArgs) -> Self {
        Self { manager, args }
    }
}

#[async_trait(?Send)]
impl Command for CheckCommand {
    async fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let report = if self.args.json {
            self.manager.check_all(Arc::new(NullSink)).await?
        } else {
            ui.show_header("Prerequisites");
            let sink = ui.start_progress();
            let report = self.manager.check_all(sink).await;
            ui.finish_progress();
            report?
        };

        if self.args.json {
            let json = serde_json::to_string_pretty(&report).map_err(anyhow::Error::from)?;
            ui.message(&json);
        } else {
            display::show_report(ui, &report);
        }

        if report.all_required_installed() {
            Ok(CommandResult::success())
        } else {
            Ok(CommandResult::failure(1))
        }
    }
}
