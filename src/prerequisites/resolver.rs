//! Runtime version resolution.
//!
//! Per-version prerequisites are checked once for every runtime version the
//! project targets. The [`VersionResolver`] lists what the runtime manager
//! has installed; [`select_targets`] narrows that to the versions to check.

use async_trait::async_trait;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;

use crate::cache::{CacheKey, CacheStore};
use crate::error::Result;
use crate::shell::{CommandRunner, RunOptions};

use super::status::CacheValue;

static VERSION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v?(\d+(?:\.\d+)*)$").unwrap());

/// Lists installed runtime versions.
#[async_trait]
pub trait VersionResolver: Send + Sync {
    /// Ordered, de-duplicated installed versions.
    ///
    /// Any failure yields an empty list.
    async fn resolve_versions(&self) -> Vec<String>;
}

/// A fixed list, for callers that already know the versions.
#[derive(Debug, Clone, Default)]
pub struct StaticVersionResolver {
    versions: Vec<String>,
}

impl StaticVersionResolver {
    pub fn new<I, S>(versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique = Vec::new();
        for v in versions {
            let v = v.into();
            if !unique.contains(&v) {
                unique.push(v);
            }
        }
        Self { versions: unique }
    }
}

#[async_trait]
impl VersionResolver for StaticVersionResolver {
    async fn resolve_versions(&self) -> Vec<String> {
        self.versions.clone()
    }
}

/// Asks the runtime manager (`fnm list` by default) and caches the answer.
pub struct ManagerVersionResolver {
    runner: Arc<dyn CommandRunner>,
    cache: Arc<CacheStore<CacheValue>>,
    key: CacheKey,
    list_command: Option<String>,
    timeout: Duration,
    ttl: Duration,
}

impl ManagerVersionResolver {
    /// # Errors
    ///
    /// Returns `MalformedCacheKey` if `manager` cannot be used as a key.
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        cache: Arc<CacheStore<CacheValue>>,
        manager: &str,
        list_command: Option<String>,
        timeout: Duration,
        ttl: Duration,
    ) -> Result<Self> {
        Ok(Self {
            runner,
            cache,
            key: CacheKey::installed_versions(manager)?,
            list_command,
            timeout,
            ttl,
        })
    }

    /// Cache key of the versions listing.
    pub fn cache_key(&self) -> &CacheKey {
        &self.key
    }
}

#[async_trait]
impl VersionResolver for ManagerVersionResolver {
    async fn resolve_versions(&self) -> Vec<String> {
        if let Some(CacheValue::Versions(versions)) = self.cache.get(&self.key) {
            tracing::debug!("Cache hit for '{}'", self.key);
            return versions;
        }

        let Some(command) = self.list_command.as_deref() else {
            tracing::debug!("No runtime list command configured");
            return Vec::new();
        };

        let output = match self.runner.run(command, &RunOptions::shell(self.timeout)).await {
            Ok(output) if output.success() => output,
            Ok(output) => {
                tracing::warn!(
                    "'{}' exited with {:?}; per-version checks cannot run",
                    command,
                    output.exit_code
                );
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!("{}; per-version checks cannot run", e);
                return Vec::new();
            }
        };

        match parse_version_list(&output.stdout) {
            Some(versions) => {
                tracing::debug!("Runtime versions: {}", versions.join(", "));
                // An empty listing is not cached, so installing a runtime is
                // noticed on the next check.
                if !versions.is_empty() {
                    self.cache
                        .set(self.key.clone(), CacheValue::Versions(versions.clone()), self.ttl);
                }
                versions
            }
            None => {
                tracing::warn!("'{}' reported an error; ignoring its version list", command);
                Vec::new()
            }
        }
    }
}

/// Parse a version manager listing.
///
/// Accepts lines such as `v18.19.0`, `* v20.11.1 default`, and `18.19.0`.
/// Aliases such as `system` are skipped. Returns `None` if any line reports
/// an error, so a partial listing is never trusted.
pub fn parse_version_list(output: &str) -> Option<Vec<String>> {
    let mut versions: Vec<String> = Vec::new();

    for line in output.lines() {
        let lower = line.to_ascii_lowercase();
        if lower.contains("error") || lower.contains("warning: unable") {
            return None;
        }

        let token = line
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| c == '*' || c == '-' || c == '>'))
            .find_map(|t| VERSION_TOKEN.captures(t).and_then(|c| c.get(1)));

        if let Some(version) = token {
            let version = version.as_str().to_string();
            if !versions.contains(&version) {
                versions.push(version);
            }
        }
    }

    Some(versions)
}

/// A runtime version to check a per-version prerequisite against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTarget {
    /// Label used in reports, cache keys, and `{version}` substitution
    pub label: String,
    /// Matching installed version, if any
    pub installed: Option<String>,
}

/// Choose which versions to check.
///
/// With no required versions, every installed version is a target. With
/// required versions, exactly those are targets; each matches an installed
/// version that is equal to it or starts with it as a dotted prefix (`18`
/// matches `18.19.0`, not `180.1`).
pub fn select_targets(installed: &[String], required: &[String]) -> Vec<VersionTarget> {
    if required.is_empty() {
        return installed
            .iter()
            .map(|v| VersionTarget {
                label: v.clone(),
                installed: Some(v.clone()),
            })
            .collect();
    }

    let mut targets: Vec<VersionTarget> = Vec::new();
    for wanted in required {
        if targets.iter().any(|t| &t.label == wanted) {
            continue;
        }
        let wanted_bare = wanted.trim_start_matches('v');
        let found = installed
            .iter()
            .filter(|v| version_matches(v, wanted_bare))
            .max_by(|a, b| compare_versions(a, b))
            .cloned();
        targets.push(VersionTarget {
            label: wanted.clone(),
            installed: found,
        });
    }
    targets
}

fn version_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted
        || installed
            .strip_prefix(wanted)
            .is_some_and(|rest| rest.starts_with('.'))
}

fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let parts = |s: &str| -> Vec<u64> { s.split('.').map(|p| p.parse().unwrap_or(0)).collect() };
    parts(a).cmp(&parts(b))
}
