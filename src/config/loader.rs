//! Configuration file discovery and loading.
//!
//! Prerequisites come from exactly one source, chosen in this order:
//! 1. An explicit `--config` path
//! 2. The project file (`.preflight/prerequisites.yml`)
//! 3. The built-in set compiled into the binary

use crate::config::schema::PreflightConfig;
use crate::config::validator::validate;
use crate::error::{PreflightError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Built-in prerequisite set.
pub const BUILTIN_PREREQUISITES: &str = include_str!("../../assets/prerequisites.yml");

/// Directory holding project-level preflight files.
pub const CONFIG_DIR: &str = ".preflight";

/// Project prerequisites file name.
pub const CONFIG_FILE: &str = "prerequisites.yml";

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// A file on disk.
    File(PathBuf),
    /// The built-in set.
    Builtin,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Builtin => write!(f, "built-in prerequisites"),
        }
    }
}

/// Paths to configuration files.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Explicit override from the command line
    pub explicit: Option<PathBuf>,

    /// Project config: .preflight/prerequisites.yml
    pub project: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover config files for the given project root.
    pub fn discover(project_root: &Path, explicit: Option<&Path>) -> Self {
        Self {
            explicit: explicit.map(Path::to_path_buf),
            project: Self::find_project_config(project_root),
        }
    }

    fn find_project_config(project_root: &Path) -> Option<PathBuf> {
        let path = project_root.join(CONFIG_DIR).join(CONFIG_FILE);
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// The source that wins.
    pub fn source(&self) -> ConfigSource {
        match (&self.explicit, &self.project) {
            (Some(path), _) | (None, Some(path)) => ConfigSource::File(path.clone()),
            (None, None) => ConfigSource::Builtin,
        }
    }
}

/// Find the project root by walking up from `start`.
///
/// Looks for a `.preflight` directory first, then `.git`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        if current.join(CONFIG_DIR).is_dir() {
            return Some(current);
        }

        if current.join(".git").exists() {
            return Some(current);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load a single config file.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
pub fn load_config_file(path: &Path) -> Result<PreflightConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PreflightError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            PreflightError::Io(e)
        }
    })?;

    parse_config(&content, path)
}

/// Parse YAML content into a config.
pub fn parse_config(content: &str, source_path: &Path) -> Result<PreflightConfig> {
    // An empty document deserializes as unit, not as an empty map.
    if content.trim().is_empty() {
        return Ok(PreflightConfig::default());
    }

    serde_yaml::from_str(content).map_err(|e| PreflightError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// The built-in prerequisite set.
pub fn builtin_config() -> Result<PreflightConfig> {
    parse_config(BUILTIN_PREREQUISITES, Path::new("<builtin>"))
}

/// Discover, load, and validate the configuration for a project.
pub fn load_config(
    project_root: &Path,
    config_override: Option<&Path>,
) -> Result<(PreflightConfig, ConfigSource)> {
    let source = ConfigPaths::discover(project_root, config_override).source();

    let config = match &source {
        ConfigSource::File(path) => load_config_file(path)?,
        ConfigSource::Builtin => builtin_config()?,
    };
    validate(&config)?;

    tracing::debug!(
        "Loaded {} prerequisites from {}",
        config.prerequisites.len(),
        source
    );
    Ok((config, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
prerequisites:
  - id: git
    name: Git
    check:
      command: git --version
"#;

    fn write_project_config(root: &Path, content: &str) -> PathBuf {
        let dir = root.join(CONFIG_DIR);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn builtin_config_is_valid() {
        let config = builtin_config().unwrap();
        validate(&config).unwrap();
        assert!(config.prerequisite("aio-cli").unwrap().per_version);
        assert!(config.prerequisite("docker").unwrap().optional);
    }

    #[test]
    fn discover_finds_project_config() {
        let temp = TempDir::new().unwrap();
        write_project_config(temp.path(), MINIMAL);

        let paths = ConfigPaths::discover(temp.path(), None);
        assert!(paths.project.is_some());
        assert!(matches!(paths.source(), ConfigSource::File(_)));
    }

    #[test]
    fn explicit_path_wins_over_project() {
        let temp = TempDir::new().unwrap();
        write_project_config(temp.path(), MINIMAL);
        let explicit = temp.path().join("custom.yml");

        let paths = ConfigPaths::discover(temp.path(), Some(&explicit));
        assert_eq!(paths.source(), ConfigSource::File(explicit));
    }

    #[test]
    fn falls_back_to_builtin() {
        let temp = TempDir::new().unwrap();
        let (config, source) = load_config(temp.path(), None).unwrap();
        assert_eq!(source, ConfigSource::Builtin);
        assert!(!config.prerequisites.is_empty());
    }

    #[test]
    fn load_config_reads_project_file() {
        let temp = TempDir::new().unwrap();
        write_project_config(temp.path(), MINIMAL);

        let (config, source) = load_config(temp.path(), None).unwrap();
        assert!(matches!(source, ConfigSource::File(_)));
        assert_eq!(config.prerequisites.len(), 1);
        assert_eq!(config.prerequisites[0].id, "git");
    }

    #[test]
    fn load_config_rejects_invalid_file() {
        let temp = TempDir::new().unwrap();
        write_project_config(
            temp.path(),
            "settings:\n  cache:\n    jitter: 0.5\n",
        );

        let result = load_config(temp.path(), None);
        assert!(matches!(
            result,
            Err(PreflightError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn explicit_missing_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.yml");
        let result = load_config(temp.path(), Some(&missing));
        assert!(matches!(result, Err(PreflightError::ConfigNotFound { .. })));
    }

    #[test]
    fn parse_error_is_reported() {
        let result = parse_config("prerequisites: [", Path::new("bad.yml"));
        assert!(matches!(
            result,
            Err(PreflightError::ConfigParseError { .. })
        ));
    }

    #[test]
    fn empty_file_is_default_config() {
        let config = parse_config("", Path::new("empty.yml")).unwrap();
        assert!(config.prerequisites.is_empty());
    }

    #[test]
    fn find_project_root_prefers_preflight_dir() {
        let temp = TempDir::new().unwrap();
        let subdir = temp.path().join("nested").join("project");
        fs::create_dir_all(&subdir).unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        fs::create_dir_all(subdir.join(CONFIG_DIR)).unwrap();

        assert_eq!(find_project_root(&subdir), Some(subdir));
    }

    #[test]
    fn find_project_root_falls_back_to_git() {
        let temp = TempDir::new().unwrap();
        let subdir = temp.path().join("src");
        fs::create_dir_all(&subdir).unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();

        assert_eq!(find_project_root(&subdir), Some(temp.path().to_path_buf()));
    }
}
