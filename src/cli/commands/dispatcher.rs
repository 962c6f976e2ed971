//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::args::{CheckArgs, Cli, Commands};
use crate::config::{load_config, ConfigSource, PreflightConfig};
use crate::error::{PreflightError, Result};
use crate::prerequisites::PrerequisiteManager;
use crate::shell::CommandRunner;
use crate::ui::UserInterface;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
#[async_trait(?Send)]
pub trait Command {
    /// Execute the command, returning its exit status.
    async fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    project_root: PathBuf,
    config_override: Option<PathBuf>,
    runner: Arc<dyn CommandRunner>,
}

impl CommandDispatcher {
    /// Create a dispatcher that runs checks and installs through `runner`.
    pub fn new(project_root: PathBuf, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            project_root,
            config_override: None,
            runner,
        }
    }

    /// Use an explicit prerequisites file instead of discovery.
    pub fn with_config(mut self, path: Option<PathBuf>) -> Self {
        self.config_override = path;
        self
    }

    /// Get the project root path.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    fn load(&self) -> Result<(PreflightConfig, ConfigSource)> {
        load_config(&self.project_root, self.config_override.as_deref())
    }

    fn manager(&self, config: PreflightConfig) -> Result<PrerequisiteManager> {
        PrerequisiteManager::new(config, self.runner.clone())
    }

    /// Dispatch and execute a command.
    ///
    /// A missing `--config` file is reported and exits with code 2.
    pub async fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        if let Some(Commands::Completions(args)) = &cli.command {
            let cmd = super::completions::CompletionsCommand::new(args.clone());
            return cmd.execute(ui).await;
        }

        let (config, source) = match self.load() {
            Ok(loaded) => loaded,
            Err(PreflightError::ConfigNotFound { path }) => {
                ui.error(&format!("No prerequisites file at {}", path.display()));
                return Ok(CommandResult::failure(2));
            }
            Err(e) => return Err(e),
        };
        tracing::debug!("Using {}", source);

        match &cli.command {
            Some(Commands::List(args)) => {
                let cmd = super::list::ListCommand::new(config, source, args.clone());
                cmd.execute(ui).await
            }
            Some(Commands::Install(args)) => {
                let cmd = super::install::InstallCommand::new(self.manager(config)?, args.clone());
                cmd.execute(ui).await
            }
            Some(Commands::Check(args)) => {
                let cmd = super::check::CheckCommand::new(self.manager(config)?, args.clone());
                cmd.execute(ui).await
            }
            Some(Commands::Completions(_)) | None => {
                let cmd =
                    super::check::CheckCommand::new(self.manager(config)?, CheckArgs::default());
                cmd.execute(ui).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{MockResponse, MockRunner};
    use crate::ui::MockUI;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
prerequisites:
  - id: git
    name: Git
    check:
      command: git --version
"#;

    fn project(config: &str) -> TempDir {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".preflight");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("prerequisites.yml"), config).unwrap();
        temp
    }

    #[test]
    fn command_result_success() {
        let result = CommandResult::success();
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn command_result_failure() {
        let result = CommandResult::failure(1);
        assert!(!result.success);
        assert_eq!(result.exit_code, 1);
    }

    #[tokio::test]
    async fn default_command_is_check() {
        let temp = project(CONFIG);
        let runner = Arc::new(MockRunner::new().on("git", MockResponse::ok("git version 2.43.0")));
        let dispatcher = CommandDispatcher::new(temp.path().to_path_buf(), runner.clone());
        let cli = Cli::try_parse_from(["preflight"]).unwrap();
        let mut ui = MockUI::new();

        let result = dispatcher.dispatch(&cli, &mut ui).await.unwrap();

        assert!(result.success);
        assert_eq!(runner.count_matching("git --version"), 1);
    }

    #[tokio::test]
    async fn missing_explicit_config_exits_2() {
        let temp = TempDir::new().unwrap();
        let dispatcher = CommandDispatcher::new(temp.path().to_path_buf(), Arc::new(MockRunner::new()))
            .with_config(Some(temp.path().join("nope.yml")));
        let cli = Cli::try_parse_from(["preflight", "list"]).unwrap();
        let mut ui = MockUI::new();

        let result = dispatcher.dispatch(&cli, &mut ui).await.unwrap();

        assert_eq!(result.exit_code, 2);
        assert!(ui.has_error("nope.yml"));
    }
}
