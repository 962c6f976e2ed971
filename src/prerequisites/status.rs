//! Prerequisite status types.
//!
//! Every check produces fresh status values; nothing here is mutated after
//! construction. Failures are classified rather than raised, so a missing
//! tool is a status, not an error.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Why a check unit did not count as installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckFailure {
    /// The program does not exist (exit 127 or spawn `NotFound`).
    ToolNotFound,
    /// The command ran and exited non-zero.
    NonZeroExit { code: Option<i32> },
    /// The command was killed after the check timeout.
    Timeout { secs: u64 },
    /// The command could not be started for another reason.
    SpawnFailure { message: String },
    /// The command succeeded but its output lacked the expected text.
    MissingOutput { expected: String },
    /// The runtime version is not installed, so nothing was run.
    VersionNotInstalled,
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckFailure::ToolNotFound => write!(f, "not found"),
            CheckFailure::NonZeroExit { code: Some(code) } => write!(f, "exited with {}", code),
            CheckFailure::NonZeroExit { code: None } => write!(f, "killed by signal"),
            CheckFailure::Timeout { secs } => write!(f, "timed out after {}s", secs),
            CheckFailure::SpawnFailure { message } => write!(f, "could not start: {}", message),
            CheckFailure::MissingOutput { expected } => {
                write!(f, "output did not contain '{}'", expected)
            }
            CheckFailure::VersionNotInstalled => write!(f, "runtime version not installed"),
        }
    }
}

/// Outcome of a single check command. This is what gets cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckRecord {
    pub installed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<CheckFailure>,
}

impl CheckRecord {
    pub fn installed(version: Option<String>) -> Self {
        Self {
            installed: true,
            version,
            failure: None,
        }
    }

    pub fn missing(failure: CheckFailure) -> Self {
        Self {
            installed: false,
            version: None,
            failure: Some(failure),
        }
    }
}

/// Cached payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    /// Result of a prerequisite, per-version, or plugin check.
    Check(CheckRecord),
    /// Versions reported by the runtime manager.
    Versions(Vec<String>),
}

/// Whether a status could be established at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Verification {
    Verified,
    /// Per-version checks could not run because no runtime versions were found.
    Undetermined { reason: String },
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Verification::Verified)
    }
}

/// Result for one runtime version of a per-version prerequisite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionResult {
    pub version: String,
    pub installed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<CheckFailure>,
}

/// Result for one plugin of a prerequisite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginStatus {
    pub id: String,
    pub name: String,
    pub installed: bool,
    pub can_install: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<CheckFailure>,
}

/// Derived state of one declared prerequisite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrerequisiteStatus {
    pub id: String,
    pub name: String,
    pub installed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Present only for per-version prerequisites, in checked order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versions: Option<Vec<VersionResult>>,
    pub can_install: bool,
    pub optional: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginStatus>,
    pub verification: Verification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<CheckFailure>,
}

impl PrerequisiteStatus {
    /// Missing and not optional.
    pub fn is_blocking(&self) -> bool {
        !self.installed && !self.optional
    }

    /// Versions that were checked and found missing.
    pub fn missing_versions(&self) -> Vec<&str> {
        self.versions
            .iter()
            .flatten()
            .filter(|v| !v.installed)
            .map(|v| v.version.as_str())
            .collect()
    }

    /// Plugins reported missing.
    pub fn missing_plugins(&self) -> Vec<&PluginStatus> {
        self.plugins.iter().filter(|p| !p.installed).collect()
    }

    /// Installed with every plugin present.
    pub fn is_complete(&self) -> bool {
        self.installed && self.plugins.iter().all(|p| p.installed)
    }
}

/// Statuses for every declared prerequisite, in declaration order.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub checked_at: DateTime<Utc>,
    pub statuses: Vec<PrerequisiteStatus>,
}

impl StatusReport {
    pub fn new(statuses: Vec<PrerequisiteStatus>) -> Self {
        Self {
            checked_at: Utc::now(),
            statuses,
        }
    }

    pub fn get(&self, id: &str) -> Option<&PrerequisiteStatus> {
        self.statuses.iter().find(|s| s.id == id)
    }

    /// Every non-optional prerequisite is installed.
    pub fn all_required_installed(&self) -> bool {
        self.statuses.iter().all(|s| !s.is_blocking())
    }

    /// Prerequisites that are not installed, optional or not.
    pub fn missing(&self) -> Vec<&PrerequisiteStatus> {
        self.statuses.iter().filter(|s| !s.installed).collect()
    }

    /// Missing prerequisites that are not optional.
    pub fn blocking(&self) -> Vec<&PrerequisiteStatus> {
        self.statuses.iter().filter(|s| s.is_blocking()).collect()
    }

    /// Missing prerequisites (or missing plugins) that can be installed.
    pub fn installable(&self) -> Vec<&PrerequisiteStatus> {
        self.statuses
            .iter()
            .filter(|s| {
                (!s.installed && s.can_install)
                    || (s.installed && s.missing_plugins().iter().any(|p| p.can_install))
            })
            .collect()
    }

    pub fn installed_count(&self) -> usize {
        self.statuses.iter().filter(|s| s.installed).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(id: &str, installed: bool, optional: bool) -> PrerequisiteStatus {
        PrerequisiteStatus {
            id: id.to_string(),
            name: id.to_string(),
            installed,
            version: None,
            versions: None,
            can_install: true,
            optional,
            plugins: Vec::new(),
            verification: Verification::Verified,
            failure: None,
        }
    }

    #[test]
    fn optional_missing_is_not_blocking() {
        let report = StatusReport::new(vec![status("git", true, false), status("docker", false, true)]);
        assert!(report.all_required_installed());
        assert_eq!(report.missing().len(), 1);
        assert!(report.blocking().is_empty());
    }

    #[test]
    fn required_missing_is_blocking() {
        let report = StatusReport::new(vec![status("git", false, false)]);
        assert!(!report.all_required_installed());
        assert_eq!(report.blocking()[0].id, "git");
        assert_eq!(report.installable().len(), 1);
    }

    #[test]
    fn missing_versions_lists_failed_units() {
        let mut s = status("aio", false, false);
        s.versions = Some(vec![
            VersionResult {
                version: "18".into(),
                installed: true,
                detected_version: Some("10.0.0".into()),
                failure: None,
            },
            VersionResult {
                version: "20".into(),
                installed: false,
                detected_version: None,
                failure: Some(CheckFailure::ToolNotFound),
            },
        ]);
        assert_eq!(s.missing_versions(), vec!["20"]);
    }

    #[test]
    fn installed_with_missing_plugin_is_incomplete_and_installable() {
        let mut s = status("aio", true, false);
        s.plugins.push(PluginStatus {
            id: "mesh".into(),
            name: "Mesh".into(),
            installed: false,
            can_install: true,
            failure: None,
        });
        assert!(!s.is_complete());
        let report = StatusReport::new(vec![s]);
        assert_eq!(report.installable().len(), 1);
    }

    #[test]
    fn failure_display() {
        assert_eq!(CheckFailure::ToolNotFound.to_string(), "not found");
        assert_eq!(
            CheckFailure::NonZeroExit { code: Some(2) }.to_string(),
            "exited with 2"
        );
        assert_eq!(
            CheckFailure::Timeout { secs: 10 }.to_string(),
            "timed out after 10s"
        );
    }

    #[test]
    fn report_serializes_to_json() {
        let mut s = status("aio", false, false);
        s.verification = Verification::Undetermined {
            reason: "no runtime versions".into(),
        };
        s.failure = Some(CheckFailure::NonZeroExit { code: Some(1) });
        let json = serde_json::to_value(StatusReport::new(vec![s])).unwrap();

        let first = &json["statuses"][0];
        assert_eq!(first["verification"]["state"], "undetermined");
        assert_eq!(first["failure"]["kind"], "non_zero_exit");
        assert!(json["checked_at"].is_string());
    }
}
