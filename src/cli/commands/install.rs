//! Install command implementation.
//!
//! The `preflight install` command installs named prerequisites, or every
//! installable one that is missing, then re-checks and shows the result.

use async_trait::async_trait;

use crate::cli::args::InstallArgs;
use crate::error::{PreflightError, Result};
use crate::prerequisites::{AttemptOutcome, InstallResult, PrerequisiteManager};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::display;

/// The install command implementation.
pub struct InstallCommand {
    manager: PrerequisiteManager,
    args: InstallArgs,
}

impl InstallCommand {
    pub fn new(manager: PrerequisiteManager, args: InstallArgs) -> Self {
        Self { manager, args }
    }

    /// Ids to install, in declaration order for `--missing`.
    async fn targets(&self, ui: &mut dyn UserInterface) -> Result<Vec<String>> {
        if !self.args.missing {
            for id in &self.args.ids {
                self.manager.definition(id)?;
            }
            return Ok(self.args.ids.clone());
        }

        let sink = ui.start_progress();
        let report = self.manager.check_all(sink).await;
        ui.finish_progress();
        Ok(report?
            .installable()
            .iter()
            .map(|s| s.id.clone())
            .collect())
    }

    fn show_result(ui: &mut dyn UserInterface, result: &InstallResult) {
        if result.success {
            ui.success(&result.summary());
            if result.used_fallback() {
                ui.warning("Fast install failed; succeeded with the safe profile");
            }
            return;
        }

        ui.error(&result.summary());
        let Some(attempt) = result.failed_step().and_then(|s| s.failure()) else {
            return;
        };
        ui.message(&format!("  $ {}", attempt.command));
        if let AttemptOutcome::Failed { stderr_tail, .. } = &attempt.outcome {
            for line in stderr_tail.lines() {
                ui.message(&format!("  {}", line));
            }
        }
    }
}

#[async_trait(?Send)]
impl Command for InstallCommand {
    async fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let targets = self.targets(ui).await?;
        if targets.is_empty() {
            ui.success("Nothing to install");
            return Ok(CommandResult::success());
        }

        let names: Vec<&str> = targets
            .iter()
            .filter_map(|id| self.manager.definition(id).ok())
            .map(|d| d.name.as_str())
            .collect();
        let question = format!("Install {}?", names.join(", "));
        if !self.args.yes && !ui.confirm(&question, true)? {
            ui.message("Cancelled");
            return Ok(CommandResult::success());
        }

        let mut failed = 0;
        for id in &targets {
            let sink = ui.start_progress();
            let outcome = self.manager.install(id, sink).await;
            ui.finish_progress();

            match outcome {
                Ok(result) => {
                    if !result.success {
                        failed += 1;
                    }
                    Self::show_result(ui, &result);
                }
                Err(e @ PreflightError::NotInstallable { .. }) => {
                    failed += 1;
                    ui.warning(&e.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        ui.show_header("Prerequisites");
        let sink = ui.start_progress();
        let report = self.manager.check_all(sink).await;
        ui.finish_progress();
        display::show_report(ui, &report?);

        if failed > 0 {
            Ok(CommandResult::failure(1))
        } else {
            Ok(CommandResult::success())
        }
    }
}
