//! Configuration validation rules.
//!
//! This module validates configuration for correctness:
//! - Prerequisite and plugin ids are unique and usable as cache keys
//! - Cache and timeout settings are in range
//! - Fast install profiles never skip security checks
//! - Per-version prerequisites have a runtime to enumerate versions with

use crate::config::schema::{CheckRecipe, InstallRecipe, PreflightConfig};
use crate::error::{PreflightError, Result};
use regex::Regex;
use std::collections::HashSet;
use std::ops::RangeInclusive;

/// Allowed jitter fractions.
pub const JITTER_RANGE: RangeInclusive<f64> = 0.05..=0.15;

/// Flags that disable audits, signature checks, or lifecycle scripts.
pub const SECURITY_SKIPPING_FLAGS: &[&str] = &[
    "--no-audit",
    "--audit=false",
    "--ignore-scripts",
    "--ignore-scripts=true",
    "--no-verify",
    "--no-verify-signatures",
    "--skip-audit",
    "--insecure",
];

/// Validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Rule identifier
    pub rule: String,
    /// Human-readable error message
    pub message: String,
    /// Prerequisite id if error is prerequisite-specific
    pub prerequisite: Option<String>,
}

impl ValidationError {
    fn new(rule: &str, message: String, prerequisite: Option<&str>) -> Self {
        Self {
            rule: rule.to_string(),
            message,
            prerequisite: prerequisite.map(str::to_string),
        }
    }
}

/// Validate a configuration and return all errors.
///
/// All errors are collected rather than stopping at the first one, so
/// several problems can be fixed at once.
pub fn validate_config(config: &PreflightConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_settings(config));
    errors.extend(validate_runtime(config));
    errors.extend(validate_prerequisites(config));

    errors
}

/// Whether `id` is a legal prerequisite, plugin, or version identifier.
///
/// Allowed characters are ASCII alphanumerics and `. _ @ / + -`, which keeps
/// identifiers clear of the cache key separator.
pub fn is_valid_identifier(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '@' | '/' | '+' | '-'))
}

fn validate_settings(config: &PreflightConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let settings = &config.settings;

    if !JITTER_RANGE.contains(&settings.cache.jitter) {
        errors.push(ValidationError::new(
            "jitter-range",
            format!(
                "Cache jitter {} is outside {}..={}",
                settings.cache.jitter,
                JITTER_RANGE.start(),
                JITTER_RANGE.end()
            ),
            None,
        ));
    }

    if settings.cache.capacity == 0 {
        errors.push(ValidationError::new(
            "zero-capacity",
            "Cache capacity must be greater than zero".to_string(),
            None,
        ));
    }

    for (name, value) in [
        ("check_timeout_secs", settings.check_timeout_secs),
        ("install_timeout_secs", settings.install_timeout_secs),
        ("cache.ttl_secs", settings.cache.ttl_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(
                "zero-duration",
                format!("Setting '{}' must be greater than zero", name),
                None,
            ));
        }
    }

    if settings.progress.heartbeat_secs == Some(0) {
        errors.push(ValidationError::new(
            "zero-duration",
            "Setting 'progress.heartbeat_secs' must be greater than zero".to_string(),
            None,
        ));
    }

    errors
}

fn validate_runtime(config: &PreflightConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let runtime = &config.runtime;

    if !is_valid_identifier(&runtime.manager) {
        errors.push(ValidationError::new(
            "invalid-id",
            format!("Runtime manager name '{}' is not a valid identifier", runtime.manager),
            None,
        ));
    }

    for version in &runtime.required_versions {
        if !is_valid_identifier(version) {
            errors.push(ValidationError::new(
                "invalid-version",
                format!("Required version '{}' is not a valid version label", version),
                None,
            ));
        }
    }

    let needs_list = config.prerequisites.iter().any(|p| p.per_version);
    let has_list = runtime
        .list_command
        .as_deref()
        .is_some_and(|c| !c.trim().is_empty());
    if needs_list && !has_list {
        for p in config.prerequisites.iter().filter(|p| p.per_version) {
            errors.push(ValidationError::new(
                "missing-list-command",
                format!(
                    "Prerequisite '{}' is per-version but runtime.list_command is not set",
                    p.id
                ),
                Some(&p.id),
            ));
        }
    }

    errors
}

fn validate_prerequisites(config: &PreflightConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for prereq in &config.prerequisites {
        let id = prereq.id.as_str();

        if !is_valid_identifier(id) {
            errors.push(ValidationError::new(
                "invalid-id",
                format!("Prerequisite id '{}' is not a valid identifier", id),
                Some(id),
            ));
        }
        if !seen.insert(id) {
            errors.push(ValidationError::new(
                "duplicate-id",
                format!("Prerequisite '{}' is declared more than once", id),
                Some(id),
            ));
        }

        errors.extend(validate_check(&prereq.check, id));
        if let Some(install) = &prereq.install {
            errors.extend(validate_install(install, id));
        }

        let mut plugin_ids = HashSet::new();
        for plugin in &prereq.plugins {
            if !is_valid_identifier(&plugin.id) {
                errors.push(ValidationError::new(
                    "invalid-id",
                    format!(
                        "Plugin id '{}' of '{}' is not a valid identifier",
                        plugin.id, id
                    ),
                    Some(id),
                ));
            }
            if !plugin_ids.insert(plugin.id.as_str()) {
                errors.push(ValidationError::new(
                    "duplicate-id",
                    format!("Plugin '{}' of '{}' is declared more than once", plugin.id, id),
                    Some(id),
                ));
            }
            errors.extend(validate_check(&plugin.check, id));
            if let Some(install) = &plugin.install {
                errors.extend(validate_install(install, id));
            }
        }
    }

    errors
}

fn validate_check(check: &CheckRecipe, id: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if check.command.trim().is_empty() {
        errors.push(ValidationError::new(
            "missing-command",
            format!("Check for '{}' has an empty command", id),
            Some(id),
        ));
    }

    if let Some(pattern) = &check.version_regex {
        if let Err(e) = Regex::new(pattern) {
            errors.push(ValidationError::new(
                "invalid-regex",
                format!("Version regex for '{}' does not compile: {}", id, e),
                Some(id),
            ));
        }
    }

    errors
}

fn validate_install(install: &InstallRecipe, id: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if install.command.trim().is_empty() {
        errors.push(ValidationError::new(
            "missing-command",
            format!("Install for '{}' has an empty command", id),
            Some(id),
        ));
    }

    for flag in &install.fast_flags {
        if is_security_skipping(flag) {
            errors.push(ValidationError::new(
                "unsafe-fast-flag",
                format!(
                    "Fast install profile for '{}' skips security checks with '{}'",
                    id, flag
                ),
                Some(id),
            ));
        }
    }

    errors
}

fn is_security_skipping(flag: &str) -> bool {
    let flag = flag.trim().to_ascii_lowercase();
    SECURITY_SKIPPING_FLAGS.contains(&flag.as_str())
}

/// Validate and return Result (for convenience).
///
/// # Errors
///
/// Returns `ConfigValidationError` if any validation rules fail.
pub fn validate(config: &PreflightConfig) -> Result<()> {
    let errors = validate_config(config);

    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(PreflightError::ConfigValidationError {
            message: messages.join("; "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{PluginDefinition, PrerequisiteDefinition};

    fn prereq(id: &str) -> PrerequisiteDefinition {
        PrerequisiteDefinition {
            id: id.to_string(),
            name: id.to_string(),
            description: None,
            check: CheckRecipe::command(format!("{} --version", id)),
            install: None,
            per_version: false,
            optional: false,
            plugins: Vec::new(),
        }
    }

    fn config_with(prereqs: Vec<PrerequisiteDefinition>) -> PreflightConfig {
        PreflightConfig {
            prerequisites: prereqs,
            ..Default::default()
        }
    }

    fn has_rule(errors: &[ValidationError], rule: &str) -> bool {
        errors.iter().any(|e| e.rule == rule)
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&PreflightConfig::default()).is_empty());
    }

    #[test]
    fn identifier_rules() {
        assert!(is_valid_identifier("aio-cli"));
        assert!(is_valid_identifier("@adobe/aio-cli"));
        assert!(is_valid_identifier("18.19.0"));
        assert!(is_valid_identifier("node_v2+beta"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("a::b"));
        assert!(!is_valid_identifier("a:"));
        assert!(!is_valid_identifier("has space"));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let errors = validate_config(&config_with(vec![prereq("git"), prereq("git")]));
        assert!(has_rule(&errors, "duplicate-id"));
    }

    #[test]
    fn rejects_separator_in_id() {
        let errors = validate_config(&config_with(vec![prereq("node::18")]));
        assert!(has_rule(&errors, "invalid-id"));
    }

    #[test]
    fn rejects_duplicate_plugin_ids() {
        let mut p = prereq("aio");
        let plugin = PluginDefinition {
            id: "mesh".into(),
            name: "Mesh".into(),
            check: CheckRecipe::command("aio plugins"),
            install: None,
        };
        p.plugins = vec![plugin.clone(), plugin];
        let errors = validate_config(&config_with(vec![p]));
        assert!(has_rule(&errors, "duplicate-id"));
    }

    #[test]
    fn rejects_jitter_out_of_range() {
        for jitter in [0.0, 0.04, 0.16, 0.5] {
            let mut config = PreflightConfig::default();
            config.settings.cache.jitter = jitter;
            assert!(has_rule(&validate_config(&config), "jitter-range"), "{}", jitter);
        }
        for jitter in [0.05, 0.10, 0.15] {
            let mut config = PreflightConfig::default();
            config.settings.cache.jitter = jitter;
            assert!(validate_config(&config).is_empty(), "{}", jitter);
        }
    }

    #[test]
    fn rejects_zero_capacity_and_timeouts() {
        let mut config = PreflightConfig::default();
        config.settings.cache.capacity = 0;
        config.settings.check_timeout_secs = 0;
        let errors = validate_config(&config);
        assert!(has_rule(&errors, "zero-capacity"));
        assert!(has_rule(&errors, "zero-duration"));
    }

    #[test]
    fn rejects_security_skipping_fast_flags() {
        let mut p = prereq("aio");
        p.install = Some(InstallRecipe {
            command: "npm install -g aio {flags}".into(),
            fast_flags: vec!["--prefer-offline".into(), "--no-audit".into()],
            safe_flags: Vec::new(),
        });
        let errors = validate_config(&config_with(vec![p]));
        assert!(has_rule(&errors, "unsafe-fast-flag"));
    }

    #[test]
    fn accepts_performance_fast_flags() {
        let mut p = prereq("aio");
        p.install = Some(InstallRecipe {
            command: "npm install -g aio {flags}".into(),
            fast_flags: vec!["--prefer-offline".into(), "--no-fund".into()],
            safe_flags: Vec::new(),
        });
        assert!(validate_config(&config_with(vec![p])).is_empty());
    }

    #[test]
    fn per_version_requires_list_command() {
        let mut p = prereq("aio");
        p.per_version = true;
        let mut config = config_with(vec![p]);
        config.runtime.list_command = None;

        let errors = validate_config(&config);
        assert!(has_rule(&errors, "missing-list-command"));
    }

    #[test]
    fn rejects_bad_required_version() {
        let mut config = PreflightConfig::default();
        config.runtime.required_versions = vec!["18".into(), "20::x".into()];
        let errors = validate_config(&config);
        assert!(has_rule(&errors, "invalid-version"));
    }

    #[test]
    fn rejects_uncompilable_regex() {
        let mut p = prereq("git");
        p.check.version_regex = Some("(unclosed".into());
        let errors = validate_config(&config_with(vec![p]));
        assert!(has_rule(&errors, "invalid-regex"));
    }

    #[test]
    fn validate_joins_messages() {
        let mut config = config_with(vec![prereq("git"), prereq("git")]);
        config.settings.cache.capacity = 0;
        let err = validate(&config).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("more than once"));
        assert!(message.contains("capacity"));
    }
}
