//! Configuration schema definitions for preflight.
//!
//! This module contains all the struct definitions that map to
//! the YAML prerequisites file format.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::{DEFAULT_CAPACITY, DEFAULT_JITTER, DEFAULT_TTL_SECS};

/// Root configuration structure for prerequisites.yml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreflightConfig {
    /// Global settings
    pub settings: Settings,

    /// Runtime version manager used for per-version checks
    pub runtime: RuntimeSettings,

    /// Ordered prerequisite definitions
    pub prerequisites: Vec<PrerequisiteDefinition>,
}

impl PreflightConfig {
    /// Look up a prerequisite by id.
    pub fn prerequisite(&self, id: &str) -> Option<&PrerequisiteDefinition> {
        self.prerequisites.iter().find(|p| p.id == id)
    }
}

/// Global settings that apply to every check and install.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Timeout for a single check command
    pub check_timeout_secs: u64,

    /// Timeout for a single install attempt
    pub install_timeout_secs: u64,

    /// Check-result cache
    pub cache: CacheSettings,

    /// Progress reporting
    pub progress: ProgressSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            check_timeout_secs: default_check_timeout(),
            install_timeout_secs: default_install_timeout(),
            cache: CacheSettings::default(),
            progress: ProgressSettings::default(),
        }
    }
}

impl Settings {
    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }
}

fn default_check_timeout() -> u64 {
    10
}

fn default_install_timeout() -> u64 {
    300
}

/// Cache tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Base time-to-live for check results
    pub ttl_secs: u64,

    /// Maximum number of cached results
    pub capacity: usize,

    /// Fraction of the TTL applied as random jitter (0.05 to 0.15)
    pub jitter: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
            capacity: DEFAULT_CAPACITY,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Progress reporting tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressSettings {
    /// Elapsed time after which events carry an elapsed annotation
    pub elapsed_threshold_secs: u64,

    /// Re-emit the latest event at this interval while an operation runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_secs: Option<u64>,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            elapsed_threshold_secs: 30,
            heartbeat_secs: None,
        }
    }
}

/// Multi-version runtime manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Manager name, used as the cache key for its version listing
    pub manager: String,

    /// Command that lists installed runtime versions
    pub list_command: Option<String>,

    /// Versions the project needs; empty means every installed version
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required_versions: Vec<String>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            manager: "fnm".to_string(),
            list_command: Some("fnm list".to_string()),
            required_versions: Vec::new(),
        }
    }
}

/// A declared external tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrerequisiteDefinition {
    /// Unique identifier, also the cache key
    pub id: String,

    /// Display name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// How to tell whether the tool is present
    pub check: CheckRecipe,

    /// How to install the tool, if it can be installed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<InstallRecipe>,

    /// Check once per runtime version
    #[serde(default, skip_serializing_if = "is_false")]
    pub per_version: bool,

    /// Missing is reported but does not block
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,

    /// Plugins checked after the tool itself is found
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginDefinition>,
}

impl PrerequisiteDefinition {
    /// Whether an install recipe is declared.
    pub fn can_install(&self) -> bool {
        self.install.is_some()
    }

    /// The prerequisite or at least one of its plugins has an install recipe.
    pub fn has_install_recipe(&self) -> bool {
        self.install.is_some() || self.plugins.iter().any(|p| p.install.is_some())
    }
}

/// Check command for a prerequisite or plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRecipe {
    /// Command to run; `{version}` is replaced for per-version checks
    pub command: String,

    /// Regex whose first capture group is the detected version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_regex: Option<String>,

    /// Substring that must appear in stdout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<String>,

    /// Run through the login shell
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub use_shell: bool,
}

impl CheckRecipe {
    /// A shell check with no regex or expectation.
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            version_regex: None,
            expect: None,
            use_shell: true,
        }
    }
}

/// Install command with two flag profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecipe {
    /// Command to run; `{flags}` and `{version}` are substituted
    pub command: String,

    /// Flags for the first, performance-oriented attempt
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fast_flags: Vec<String>,

    /// Flags for the conservative retry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub safe_flags: Vec<String>,
}

impl InstallRecipe {
    /// A recipe with no flags in either profile.
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            fast_flags: Vec::new(),
            safe_flags: Vec::new(),
        }
    }
}

/// A plugin of a prerequisite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDefinition {
    pub id: String,
    pub name: String,
    pub check: CheckRecipe,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<InstallRecipe>,
}

fn default_true() -> bool {
    true
}

fn is_false(v: &bool) -> bool {
    !v
}

fn is_true(v: &bool) -> bool {
    *v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: PreflightConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.settings.check_timeout_secs, 10);
        assert_eq!(config.settings.install_timeout_secs, 300);
        assert_eq!(config.settings.cache.ttl_secs, 300);
        assert_eq!(config.settings.cache.capacity, 128);
        assert!((config.settings.cache.jitter - 0.10).abs() < f64::EPSILON);
        assert_eq!(config.settings.progress.elapsed_threshold_secs, 30);
        assert!(config.settings.progress.heartbeat_secs.is_none());
        assert_eq!(config.runtime.manager, "fnm");
        assert_eq!(config.runtime.list_command.as_deref(), Some("fnm list"));
        assert!(config.prerequisites.is_empty());
    }

    #[test]
    fn parses_prerequisite_with_plugins() {
        let yaml = r#"
prerequisites:
  - id: aio-cli
    name: Adobe I/O CLI
    per_version: true
    check:
      command: "fnm exec --using={version} aio --version"
    install:
      command: "fnm exec --using={version} npm install -g @adobe/aio-cli {flags}"
      fast_flags: ["--prefer-offline", "--no-fund"]
    plugins:
      - id: api-mesh
        name: API Mesh
        check:
          command: "aio plugins"
          expect: "api-mesh"
"#;
        let config: PreflightConfig = serde_yaml::from_str(yaml).unwrap();
        let aio = config.prerequisite("aio-cli").unwrap();

        assert!(aio.per_version);
        assert!(!aio.optional);
        assert!(aio.can_install());
        assert!(aio.check.use_shell);
        assert_eq!(aio.install.as_ref().unwrap().fast_flags.len(), 2);
        assert!(aio.install.as_ref().unwrap().safe_flags.is_empty());
        assert_eq!(aio.plugins[0].check.expect.as_deref(), Some("api-mesh"));
    }

    #[test]
    fn plugin_recipe_counts_as_installable() {
        let yaml = r#"
prerequisites:
  - id: aio-cli
    name: Adobe I/O CLI
    check:
      command: "aio --version"
    plugins:
      - id: api-mesh
        name: API Mesh
        check:
          command: "aio plugins"
        install:
          command: "aio plugins:install api-mesh"
  - id: git
    name: Git
    check:
      command: "git --version"
"#;
        let config: PreflightConfig = serde_yaml::from_str(yaml).unwrap();
        let aio = config.prerequisite("aio-cli").unwrap();
        assert!(!aio.can_install());
        assert!(aio.has_install_recipe());
        assert!(!config.prerequisite("git").unwrap().has_install_recipe());
    }

    #[test]
    fn runtime_list_command_can_be_disabled() {
        let yaml = "runtime:\n  manager: none\n  list_command: ~\n";
        let config: PreflightConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.runtime.manager, "none");
        assert!(config.runtime.list_command.is_none());
    }

    #[test]
    fn missing_check_is_parse_error() {
        let yaml = "prerequisites:\n  - id: git\n    name: Git\n";
        let result: std::result::Result<PreflightConfig, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn settings_durations() {
        let settings = Settings::default();
        assert_eq!(settings.check_timeout(), Duration::from_secs(10));
        assert_eq!(settings.install_timeout(), Duration::from_secs(300));
        assert_eq!(settings.cache.ttl(), Duration::from_secs(300));
    }

    #[test]
    fn serialization_skips_defaults() {
        let def = PrerequisiteDefinition {
            id: "git".into(),
            name: "Git".into(),
            description: None,
            check: CheckRecipe::command("git --version"),
            install: None,
            per_version: false,
            optional: false,
            plugins: Vec::new(),
        };
        let yaml = serde_yaml::to_string(&def).unwrap();
        assert!(!yaml.contains("per_version"));
        assert!(!yaml.contains("use_shell"));
        assert!(!yaml.contains("plugins"));
    }
}
