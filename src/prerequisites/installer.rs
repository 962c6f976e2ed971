//! Prerequisite installation.
//!
//! Every install step is tried with the fast flag profile first and retried
//! once with the safe profile. Command failures never escape as errors;
//! they are recorded in the [`InstallResult`].

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheKey, CacheStore};
use crate::config::{InstallRecipe, PrerequisiteDefinition};
use crate::progress::{Phase, ProgressUnifier};
use crate::shell::{tail, CommandRunner, RunError, RunOptions};

use super::checker::VERSION_PLACEHOLDER;
use super::status::{CacheValue, PrerequisiteStatus};

/// Placeholder replaced with the active flag profile.
pub const FLAGS_PLACEHOLDER: &str = "{flags}";

/// Lines of stderr kept in failure detail.
pub const STDERR_TAIL_LINES: usize = 20;

/// Bytes of stderr kept in failure detail.
pub const STDERR_TAIL_BYTES: usize = 2048;

/// Which flags an attempt used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagProfile {
    Fast,
    Safe,
}

impl fmt::Display for FlagProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagProfile::Fast => write!(f, "fast"),
            FlagProfile::Safe => write!(f, "safe"),
        }
    }
}

/// How one attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Failed {
        exit_code: Option<i32>,
        stderr_tail: String,
    },
    TimedOut {
        secs: u64,
    },
    SpawnFailed {
        message: String,
    },
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Succeeded => write!(f, "succeeded"),
            AttemptOutcome::Failed {
                exit_code: Some(code),
                ..
            } => write!(f, "exited with {}", code),
            AttemptOutcome::Failed { exit_code: None, .. } => write!(f, "killed by signal"),
            AttemptOutcome::TimedOut { secs } => write!(f, "timed out after {}s", secs),
            AttemptOutcome::SpawnFailed { message } => write!(f, "could not start: {}", message),
        }
    }
}

/// One run of an install command.
#[derive(Debug, Clone, Serialize)]
pub struct InstallAttempt {
    pub profile: FlagProfile,
    pub command: String,
    pub outcome: AttemptOutcome,
    #[serde(skip)]
    pub duration: Duration,
}

impl InstallAttempt {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Succeeded)
    }
}

/// What an install step installs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum InstallTarget {
    /// The prerequisite itself.
    Prerequisite,
    /// The prerequisite under one runtime version.
    Version(String),
    /// A plugin of the prerequisite.
    Plugin(String),
}

/// One install command with its attempts.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub label: String,
    pub target: InstallTarget,
    pub success: bool,
    pub attempts: Vec<InstallAttempt>,
}

impl StepResult {
    /// The last failed attempt, if the step failed.
    pub fn failure(&self) -> Option<&InstallAttempt> {
        if self.success {
            None
        } else {
            self.attempts.last()
        }
    }
}

/// Outcome of installing one prerequisite.
#[derive(Debug, Clone, Serialize)]
pub struct InstallResult {
    pub id: String,
    pub success: bool,
    pub steps: Vec<StepResult>,
    /// Why nothing was attempted, when no steps ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl InstallResult {
    fn nothing(id: &str, success: bool, note: &str) -> Self {
        Self {
            id: id.to_string(),
            success,
            steps: Vec::new(),
            note: Some(note.to_string()),
        }
    }

    /// The step that stopped the install.
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| !s.success)
    }

    /// Whether any step needed the safe-profile retry.
    pub fn used_fallback(&self) -> bool {
        self.steps.iter().any(|s| s.attempts.len() > 1)
    }

    /// One-line description for terminal output.
    pub fn summary(&self) -> String {
        if let Some(step) = self.failed_step() {
            let detail = step
                .failure()
                .map(|a| format!("{} ({} profile)", a.outcome, a.profile))
                .unwrap_or_else(|| "failed".to_string());
            return format!("{} failed: {}", step.label, detail);
        }
        if let Some(note) = &self.note {
            return format!("{}: {}", self.id, note);
        }
        let fallback = if self.used_fallback() {
            " (after safe-profile retry)"
        } else {
            ""
        };
        format!(
            "{} installed in {} step{}{}",
            self.id,
            self.steps.len(),
            if self.steps.len() == 1 { "" } else { "s" },
            fallback
        )
    }
}

/// A planned install step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub label: String,
    pub target: InstallTarget,
    pub recipe: InstallRecipe,
    pub version: Option<String>,
}

/// Work out which steps an install needs, given the current status.
///
/// - Per-version prerequisites whose recipe uses `{version}` get one step
///   per missing version.
/// - Other missing prerequisites get a single step.
/// - Missing plugins with a recipe follow, using the first known version.
///   They are only planned when the parent is installed or has a step, and
///   never when their recipe needs a version that is not known.
pub fn plan_install(
    definition: &PrerequisiteDefinition,
    status: &PrerequisiteStatus,
) -> Vec<PlannedStep> {
    let mut steps = Vec::new();
    if definition.per_version && !status.verification.is_verified() {
        return steps;
    }

    if let (false, Some(recipe)) = (status.installed, &definition.install) {
        if definition.per_version && recipe.command.contains(VERSION_PLACEHOLDER) {
            for version in status.missing_versions() {
                steps.push(PlannedStep {
                    label: format!("{}@{}", definition.name, version),
                    target: InstallTarget::Version(version.to_string()),
                    recipe: recipe.clone(),
                    version: Some(version.to_string()),
                });
            }
        } else {
            steps.push(PlannedStep {
                label: definition.name.clone(),
                target: InstallTarget::Prerequisite,
                recipe: recipe.clone(),
                version: None,
            });
        }
    }

    if !status.installed && steps.is_empty() {
        return steps;
    }

    let plugin_version = status
        .versions
        .as_ref()
        .and_then(|v| v.first())
        .map(|v| v.version.clone());
    for plugin in &definition.plugins {
        let missing = status
            .plugins
            .iter()
            .find(|p| p.id == plugin.id)
            .is_none_or(|p| !p.installed);
        let Some(plugin_recipe) = plugin.install.as_ref().filter(|_| missing) else {
            continue;
        };
        if plugin_version.is_none() && plugin_recipe.command.contains(VERSION_PLACEHOLDER) {
            tracing::debug!(
                "Skipping plugin '{}': its install needs a runtime version",
                plugin.id
            );
            continue;
        }
        steps.push(PlannedStep {
            label: format!("{} plugin {}", definition.name, plugin.name),
            target: InstallTarget::Plugin(plugin.id.clone()),
            recipe: plugin_recipe.clone(),
            version: plugin_version.clone(),
        });
    }

    steps
}

/// Build the command for one attempt.
///
/// Flags go where `{flags}` appears, otherwise at the end.
pub fn render_install_command(template: &str, flags: &[String], version: Option<&str>) -> String {
    let flags = flags.join(" ");
    let mut command = match version {
        Some(version) => template.replace(VERSION_PLACEHOLDER, version),
        None => template.to_string(),
    };

    if command.contains(FLAGS_PLACEHOLDER) {
        command = command.replace(FLAGS_PLACEHOLDER, &flags);
    } else if !flags.is_empty() {
        command.push(' ');
        command.push_str(&flags);
    }
    command.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Runs install steps and invalidates stale cache entries.
pub struct Installer {
    runner: Arc<dyn CommandRunner>,
    cache: Arc<CacheStore<CacheValue>>,
    versions_key: Option<CacheKey>,
    timeout: Duration,
}

impl Installer {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        cache: Arc<CacheStore<CacheValue>>,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            cache,
            versions_key: None,
            timeout,
        }
    }

    /// Also drop this runtime versions listing after an install.
    pub fn with_versions_key(mut self, key: CacheKey) -> Self {
        self.versions_key = Some(key);
        self
    }

    /// Install whatever `status` reports missing for `definition`.
    ///
    /// Steps run in order and stop at the first failure. Cache entries for
    /// the prerequisite are invalidated whenever a step changed the system.
    pub async fn install(
        &self,
        definition: &PrerequisiteDefinition,
        status: &PrerequisiteStatus,
        progress: Option<&ProgressUnifier>,
    ) -> InstallResult {
        if !definition.has_install_recipe() {
            return InstallResult::nothing(&definition.id, false, "no install recipe");
        }
        if definition.per_version && !status.verification.is_verified() {
            return InstallResult::nothing(
                &definition.id,
                false,
                "no runtime versions to install into",
            );
        }
        if status.is_complete() {
            return InstallResult::nothing(&definition.id, true, "already installed");
        }

        let plan = plan_install(definition, status);
        if plan.is_empty() {
            return InstallResult::nothing(&definition.id, false, "nothing installable is missing");
        }

        let total = plan.len();
        let slices = Phase::new(0, 100, 1).split(total);
        let mut steps = Vec::with_capacity(total);

        for (index, planned) in plan.iter().enumerate() {
            if let Some(progress) = progress {
                if let Err(e) = progress.milestone(
                    slices[index].start(),
                    &format!("Installing {}", planned.label),
                    index + 1,
                    total,
                ) {
                    tracing::debug!("Dropped install progress event: {}", e);
                }
            }

            let step = self.run_step(planned).await;
            let failed = !step.success;
            steps.push(step);
            if failed {
                break;
            }
        }

        let success = steps.len() == total && steps.iter().all(|s| s.success);
        if steps.iter().any(|s| s.success) {
            self.invalidate(&definition.id);
        }

        let result = InstallResult {
            id: definition.id.clone(),
            success,
            steps,
            note: None,
        };
        if success {
            tracing::info!("{}", result.summary());
        } else {
            tracing::warn!("{}", result.summary());
        }
        result
    }

    async fn run_step(&self, planned: &PlannedStep) -> StepResult {
        let mut attempts = Vec::with_capacity(2);

        for (profile, flags) in [
            (FlagProfile::Fast, &planned.recipe.fast_flags),
            (FlagProfile::Safe, &planned.recipe.safe_flags),
        ] {
            let command =
                render_install_command(&planned.recipe.command, flags, planned.version.as_deref());
            tracing::info!("Installing {} ({} profile): {}", planned.label, profile, command);

            let attempt = self.attempt(profile, command).await;
            let succeeded = attempt.succeeded();
            if !succeeded && profile == FlagProfile::Fast {
                tracing::warn!(
                    "{} {} with fast profile, retrying with safe profile",
                    planned.label,
                    attempt.outcome
                );
            }
            attempts.push(attempt);
            if succeeded {
                break;
            }
        }

        StepResult {
            label: planned.label.clone(),
            target: planned.target.clone(),
            success: attempts.last().is_some_and(InstallAttempt::succeeded),
            attempts,
        }
    }

    async fn attempt(&self, profile: FlagProfile, command: String) -> InstallAttempt {
        let options = RunOptions::shell(self.timeout);
        let (outcome, duration) = match self.runner.run(&command, &options).await {
            Ok(output) if output.success() => (AttemptOutcome::Succeeded, output.duration),
            Ok(output) => (
                AttemptOutcome::Failed {
                    exit_code: output.exit_code,
                    stderr_tail: tail(&output.stderr, STDERR_TAIL_LINES, STDERR_TAIL_BYTES),
                },
                output.duration,
            ),
            Err(RunError::Timeout { timeout, .. }) => (
                AttemptOutcome::TimedOut {
                    secs: timeout.as_secs(),
                },
                timeout,
            ),
            Err(RunError::Spawn { message, .. }) => {
                (AttemptOutcome::SpawnFailed { message }, Duration::ZERO)
            }
        };

        InstallAttempt {
            profile,
            command,
            outcome,
            duration,
        }
    }

    fn invalidate(&self, id: &str) {
        let removed = self.cache.invalidate_prerequisite(id);
        if let Some(key) = &self.versions_key {
            self.cache.invalidate(key);
        }
        tracing::debug!("Invalidated {} cache entries for '{}'", removed, id);
    }
}
