//! Cache-aware prerequisite checking.
//!
//! Definitions are checked strictly in order: each one, including all of
//! its per-version and plugin units, is fully resolved before the next one
//! starts. Units belonging to a single definition run concurrently.

use futures::future::join_all;
use regex::Regex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use crate::cache::{CacheKey, CacheStore};
use crate::config::{CheckRecipe, PluginDefinition, PrerequisiteDefinition};
use crate::error::Result;
use crate::progress::{Phase, ProgressUnifier};
use crate::shell::{CommandRunner, RunError, RunOptions};

use super::resolver::{select_targets, VersionResolver, VersionTarget};
use super::status::{
    CacheValue, CheckFailure, CheckRecord, PluginStatus, PrerequisiteStatus, Verification,
    VersionResult,
};

/// Placeholder replaced with the runtime version in check commands.
pub const VERSION_PLACEHOLDER: &str = "{version}";

static DEFAULT_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v?(\d+\.\d+(?:\.\d+)?)").unwrap());

/// Checks prerequisites, consulting the cache before running commands.
pub struct PrerequisiteChecker {
    runner: Arc<dyn CommandRunner>,
    resolver: Arc<dyn VersionResolver>,
    cache: Arc<CacheStore<CacheValue>>,
    ttl: Duration,
    timeout: Duration,
    required_versions: Vec<String>,
}

impl PrerequisiteChecker {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        resolver: Arc<dyn VersionResolver>,
        cache: Arc<CacheStore<CacheValue>>,
        ttl: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            resolver,
            cache,
            ttl,
            timeout,
            required_versions: Vec::new(),
        }
    }

    /// Check exactly these runtime versions instead of every installed one.
    pub fn with_required_versions(mut self, versions: Vec<String>) -> Self {
        self.required_versions = versions;
        self
    }

    /// Check every definition, in order.
    ///
    /// # Errors
    ///
    /// Only configuration problems (a definition that cannot form a cache
    /// key) are errors. Tool failures are reported in the statuses.
    pub async fn check_all(
        &self,
        definitions: &[PrerequisiteDefinition],
    ) -> Result<Vec<PrerequisiteStatus>> {
        self.check_all_with_progress(definitions, None).await
    }

    /// Like [`check_all`](Self::check_all), reporting to a running unifier.
    ///
    /// Each definition gets an equal slice of the progress range and a
    /// milestone; per-version units advance through that slice.
    pub async fn check_all_with_progress(
        &self,
        definitions: &[PrerequisiteDefinition],
        progress: Option<&ProgressUnifier>,
    ) -> Result<Vec<PrerequisiteStatus>> {
        let total = definitions.len();
        let mut statuses = Vec::with_capacity(total);

        for (index, definition) in definitions.iter().enumerate() {
            let slice = Phase::slice(index, total);
            if let Some(progress) = progress {
                progress.milestone(
                    slice.start(),
                    &format!("Checking {}", definition.name),
                    index + 1,
                    total,
                )?;
            }

            let status = self.check_in_slice(definition, progress, slice).await?;

            if let Some(progress) = progress {
                let message = if status.installed {
                    format!("{} found", definition.name)
                } else {
                    format!("{} missing", definition.name)
                };
                progress.update(slice.end(), &message)?;
            }
            statuses.push(status);
        }

        Ok(statuses)
    }

    /// Check a single definition.
    pub async fn check(&self, definition: &PrerequisiteDefinition) -> Result<PrerequisiteStatus> {
        self.check_in_slice(definition, None, Phase::new(0, 100, 1))
            .await
    }

    async fn check_in_slice(
        &self,
        definition: &PrerequisiteDefinition,
        progress: Option<&ProgressUnifier>,
        slice: Phase,
    ) -> Result<PrerequisiteStatus> {
        if definition.per_version {
            self.check_per_version(definition, progress, slice).await
        } else {
            self.check_single(definition).await
        }
    }

    async fn check_single(&self, definition: &PrerequisiteDefinition) -> Result<PrerequisiteStatus> {
        let key = CacheKey::prerequisite(&definition.id)?;
        let record = self.cached_check(key, &definition.check, None).await;

        let plugins = if record.installed {
            self.check_plugins(definition, None).await?
        } else {
            missing_plugins(definition)
        };

        Ok(PrerequisiteStatus {
            id: definition.id.clone(),
            name: definition.name.clone(),
            installed: record.installed,
            version: record.version,
            versions: None,
            can_install: definition.can_install(),
            optional: definition.optional,
            plugins,
            verification: Verification::Verified,
            failure: record.failure,
        })
    }

    async fn check_per_version(
        &self,
        definition: &PrerequisiteDefinition,
        progress: Option<&ProgressUnifier>,
        slice: Phase,
    ) -> Result<PrerequisiteStatus> {
        let installed_versions = self.resolver.resolve_versions().await;

        if installed_versions.is_empty() {
            tracing::warn!(
                "No runtime versions found; cannot verify '{}'",
                definition.id
            );
            return Ok(PrerequisiteStatus {
                id: definition.id.clone(),
                name: definition.name.clone(),
                installed: false,
                version: None,
                versions: Some(Vec::new()),
                can_install: definition.can_install(),
                optional: definition.optional,
                plugins: missing_plugins(definition),
                verification: Verification::Undetermined {
                    reason: "no runtime versions found".to_string(),
                },
                failure: None,
            });
        }

        let targets = select_targets(&installed_versions, &self.required_versions);
        // Validate every key before spawning anything.
        let keys = targets
            .iter()
            .map(|t| CacheKey::version(&definition.id, &t.label))
            .collect::<Result<Vec<_>>>()?;

        let phase = slice.with_units(targets.len());
        let done = AtomicUsize::new(0);

        let units = targets.iter().zip(keys).map(|(target, key)| {
            let done = &done;
            async move {
                let result = self.check_version(definition, target, key).await;
                if let Some(progress) = progress {
                    let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                    progress.advance(
                        &phase,
                        finished,
                        &format!("Checked {} for {}", definition.name, target.label),
                    )?;
                }
                Ok::<_, crate::error::PreflightError>(result)
            }
        });
        let versions = join_all(units)
            .await
            .into_iter()
            .collect::<Result<Vec<VersionResult>>>()?;

        let installed = !versions.is_empty() && versions.iter().all(|v| v.installed);
        let version = versions.iter().find_map(|v| v.detected_version.clone());
        let failure = versions.iter().find_map(|v| v.failure.clone());

        let plugins = if installed {
            let first = targets.first().map(|t| t.label.as_str());
            self.check_plugins(definition, first).await?
        } else {
            missing_plugins(definition)
        };

        Ok(PrerequisiteStatus {
            id: definition.id.clone(),
            name: definition.name.clone(),
            installed,
            version,
            versions: Some(versions),
            can_install: definition.can_install(),
            optional: definition.optional,
            plugins,
            verification: Verification::Verified,
            failure,
        })
    }

    async fn check_version(
        &self,
        definition: &PrerequisiteDefinition,
        target: &VersionTarget,
        key: CacheKey,
    ) -> VersionResult {
        if target.installed.is_none() {
            return VersionResult {
                version: target.label.clone(),
                installed: false,
                detected_version: None,
                failure: Some(CheckFailure::VersionNotInstalled),
            };
        }

        let record = self
            .cached_check(key, &definition.check, Some(&target.label))
            .await;
        VersionResult {
            version: target.label.clone(),
            installed: record.installed,
            detected_version: record.version,
            failure: record.failure,
        }
    }

    async fn check_plugins(
        &self,
        definition: &PrerequisiteDefinition,
        version: Option<&str>,
    ) -> Result<Vec<PluginStatus>> {
        let keys = definition
            .plugins
            .iter()
            .map(|p| CacheKey::plugin(&definition.id, &p.id))
            .collect::<Result<Vec<_>>>()?;

        let checks = definition
            .plugins
            .iter()
            .zip(keys)
            .map(|(plugin, key)| async move {
                let record = self.cached_check(key, &plugin.check, version).await;
                PluginStatus {
                    id: plugin.id.clone(),
                    name: plugin.name.clone(),
                    installed: record.installed,
                    can_install: plugin.install.is_some(),
                    failure: record.failure,
                }
            });

        Ok(join_all(checks).await)
    }

    async fn cached_check(
        &self,
        key: CacheKey,
        recipe: &CheckRecipe,
        version: Option<&str>,
    ) -> CheckRecord {
        if let Some(CacheValue::Check(record)) = self.cache.get(&key) {
            tracing::debug!("Cache hit for '{}'", key);
            return record;
        }
        tracing::debug!("Cache miss for '{}'", key);

        let record = self.run_check(recipe, version).await;
        self.cache
            .set(key, CacheValue::Check(record.clone()), self.ttl);
        record
    }

    async fn run_check(&self, recipe: &CheckRecipe, version: Option<&str>) -> CheckRecord {
        let command = render_check_command(&recipe.command, version);
        let options = if recipe.use_shell {
            RunOptions::shell(self.timeout)
        } else {
            RunOptions::direct(self.timeout)
        };

        let record = match self.runner.run(&command, &options).await {
            Ok(output) if output.success() => match &recipe.expect {
                Some(expected) if !output.stdout.contains(expected.as_str()) => {
                    CheckRecord::missing(CheckFailure::MissingOutput {
                        expected: expected.clone(),
                    })
                }
                _ => CheckRecord::installed(extract_version(
                    recipe.version_regex.as_deref(),
                    &output.stdout,
                    &output.stderr,
                )),
            },
            Ok(output) if output.not_found() => CheckRecord::missing(CheckFailure::ToolNotFound),
            Ok(output) => CheckRecord::missing(CheckFailure::NonZeroExit {
                code: output.exit_code,
            }),
            Err(e) if e.is_not_found() => CheckRecord::missing(CheckFailure::ToolNotFound),
            Err(RunError::Timeout { timeout, .. }) => CheckRecord::missing(CheckFailure::Timeout {
                secs: timeout.as_secs(),
            }),
            Err(RunError::Spawn { message, .. }) => {
                CheckRecord::missing(CheckFailure::SpawnFailure { message })
            }
        };

        match &record.failure {
            None => tracing::debug!("'{}' ok ({:?})", command, record.version),
            Some(failure) => tracing::debug!("'{}' failed: {}", command, failure),
        }
        record
    }
}

fn missing_plugins(definition: &PrerequisiteDefinition) -> Vec<PluginStatus> {
    definition
        .plugins
        .iter()
        .map(|p: &PluginDefinition| PluginStatus {
            id: p.id.clone(),
            name: p.name.clone(),
            installed: false,
            can_install: p.install.is_some(),
            failure: None,
        })
        .collect()
}

/// Substitute `{version}` in a check command.
pub fn render_check_command(template: &str, version: Option<&str>) -> String {
    match version {
        Some(version) => template.replace(VERSION_PLACEHOLDER, version),
        None => template.to_string(),
    }
}

/// Pull a version number out of command output.
///
/// Uses the first capture group of `pattern` (or the whole match if it has
/// none), falling back to a generic `x.y[.z]` pattern. Stdout is searched
/// before stderr.
pub fn extract_version(pattern: Option<&str>, stdout: &str, stderr: &str) -> Option<String> {
    let custom = pattern.and_then(|p| Regex::new(p).ok());
    let re = custom.as_ref().unwrap_or(&*DEFAULT_VERSION_RE);

    [stdout, stderr].iter().find_map(|text| {
        let caps = re.captures(text)?;
        caps.get(1)
            .or_else(|| caps.get(0))
            .map(|m| m.as_str().to_string())
    })
}
