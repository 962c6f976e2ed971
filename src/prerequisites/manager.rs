//! The orchestrator tying cache, checker, installer, and progress together.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheKey, CacheStore};
use crate::clock::{Clock, SystemClock};
use crate::config::{validate, PreflightConfig, PrerequisiteDefinition, Settings};
use crate::error::{PreflightError, Result};
use crate::progress::{ProgressSink, ProgressUnifier};
use crate::shell::CommandRunner;

use super::checker::PrerequisiteChecker;
use super::installer::{InstallResult, Installer};
use super::resolver::{ManagerVersionResolver, VersionResolver};
use super::status::{CacheValue, PrerequisiteStatus, StatusReport};

/// Owns the check-result cache and everything that reads or writes it.
///
/// Definitions are loaded once and shared read-only. The cache lives as
/// long as the manager.
pub struct PrerequisiteManager {
    definitions: Arc<[PrerequisiteDefinition]>,
    settings: Settings,
    cache: Arc<CacheStore<CacheValue>>,
    versions_key: CacheKey,
    checker: PrerequisiteChecker,
    installer: Installer,
    clock: Arc<dyn Clock>,
}

impl PrerequisiteManager {
    /// Build a manager for a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigValidationError` if the configuration is invalid.
    pub fn new(config: PreflightConfig, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        Self::with_clock(config, runner, Arc::new(SystemClock))
    }

    /// Build a manager whose cache and progress read time from `clock`.
    pub fn with_clock(
        config: PreflightConfig,
        runner: Arc<dyn CommandRunner>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        validate(&config)?;
        let PreflightConfig {
            settings,
            runtime,
            prerequisites,
        } = config;

        let cache = Arc::new(CacheStore::with_clock(
            settings.cache.capacity,
            settings.cache.jitter,
            clock.clone(),
        ));
        let ttl = settings.cache.ttl();

        let resolver = ManagerVersionResolver::new(
            runner.clone(),
            cache.clone(),
            &runtime.manager,
            runtime.list_command.clone(),
            settings.check_timeout(),
            ttl,
        )?;
        let versions_key = resolver.cache_key().clone();
        let resolver: Arc<dyn VersionResolver> = Arc::new(resolver);

        let checker = PrerequisiteChecker::new(
            runner.clone(),
            resolver,
            cache.clone(),
            ttl,
            settings.check_timeout(),
        )
        .with_required_versions(runtime.required_versions);

        let installer = Installer::new(runner, cache.clone(), settings.install_timeout())
            .with_versions_key(versions_key.clone());

        Ok(Self {
            definitions: prerequisites.into(),
            settings,
            cache,
            versions_key,
            checker,
            installer,
            clock,
        })
    }

    /// Declared prerequisites, in order.
    pub fn definitions(&self) -> &[PrerequisiteDefinition] {
        &self.definitions
    }

    /// Look up a declared prerequisite.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPrerequisite` if `id` is not declared.
    pub fn definition(&self, id: &str) -> Result<&PrerequisiteDefinition> {
        self.definitions
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| PreflightError::UnknownPrerequisite { id: id.to_string() })
    }

    /// The check-result cache.
    pub fn cache(&self) -> &CacheStore<CacheValue> {
        &self.cache
    }

    fn unifier(&self, operation: &str, sink: Arc<dyn ProgressSink>) -> ProgressUnifier {
        let progress = &self.settings.progress;
        let mut unifier = ProgressUnifier::new(operation, sink)
            .with_clock(self.clock.clone())
            .with_threshold(Duration::from_secs(progress.elapsed_threshold_secs));
        if let Some(secs) = progress.heartbeat_secs {
            unifier = unifier.with_heartbeat(Duration::from_secs(secs));
        }
        unifier
    }

    /// Check every declared prerequisite, reporting progress to `sink`.
    pub async fn check_all(&self, sink: Arc<dyn ProgressSink>) -> Result<StatusReport> {
        let unifier = self.unifier("check", sink);
        unifier.begin(&format!(
            "Checking {} prerequisites",
            self.definitions.len()
        ))?;

        match self
            .checker
            .check_all_with_progress(&self.definitions, Some(&unifier))
            .await
        {
            Ok(statuses) => {
                let report = StatusReport::new(statuses);
                let missing = report.missing().len();
                let message = if missing == 0 {
                    "All prerequisites installed".to_string()
                } else {
                    format!("{} of {} prerequisites missing", missing, report.statuses.len())
                };
                unifier.complete(&message)?;
                Ok(report)
            }
            Err(e) => {
                unifier.fail(&e.to_string())?;
                Err(e)
            }
        }
    }

    /// Check one prerequisite without progress reporting.
    pub async fn check(&self, id: &str) -> Result<PrerequisiteStatus> {
        let definition = self.definition(id)?;
        self.checker.check(definition).await
    }

    /// Install whatever is missing for `id`.
    ///
    /// The current status comes from the cache when warm, so per-version
    /// installs only target versions that are actually missing.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPrerequisite` or `NotInstallable`; command failures
    /// are reported in the returned [`InstallResult`].
    pub async fn install(&self, id: &str, sink: Arc<dyn ProgressSink>) -> Result<InstallResult> {
        let definition = self.definition(id)?;
        if !definition.has_install_recipe() {
            return Err(PreflightError::NotInstallable { id: id.to_string() });
        }

        let unifier = self.unifier("install", sink);
        unifier.begin(&format!("Installing {}", definition.name))?;

        let status = match self.checker.check(definition).await {
            Ok(status) => status,
            Err(e) => {
                unifier.fail(&e.to_string())?;
                return Err(e);
            }
        };

        let result = self
            .installer
            .install(definition, &status, Some(&unifier))
            .await;

        if result.success {
            unifier.complete(&result.summary())?;
        } else {
            unifier.fail(&result.summary())?;
        }
        Ok(result)
    }

    /// Drop cached results for one prerequisite, or everything.
    pub fn invalidate_cache(&self, id: Option<&str>) {
        match id {
            Some(id) => {
                let removed = self.cache.invalidate_prerequisite(id);
                tracing::debug!("Invalidated {} cache entries for '{}'", removed, id);
            }
            None => {
                let removed = self.cache.invalidate_all();
                tracing::debug!("Invalidated all {} cache entries", removed);
            }
        }
    }

    /// Drop the cached runtime versions listing.
    pub fn invalidate_versions(&self) -> bool {
        self.cache.invalidate(&self.versions_key)
    }
}
