//! Configuration loading, parsing, and validation.
//!
//! - Schema definitions in [`schema`]
//! - File discovery and loading in [`loader`]
//! - Validation in [`validator`]
//!
//! # Example
//!
//! ```
//! use preflight::config::{parse_config, validate};
//! use std::path::Path;
//!
//! let yaml = r#"
//! prerequisites:
//!   - id: git
//!     name: Git
//!     check:
//!       command: git --version
//! "#;
//! let config = parse_config(yaml, Path::new("prerequisites.yml")).unwrap();
//! validate(&config).unwrap();
//! assert_eq!(config.prerequisites[0].id, "git");
//! ```

pub mod loader;
pub mod schema;
pub mod validator;

pub use schema::{
    CacheSettings, CheckRecipe, InstallRecipe, PluginDefinition, PreflightConfig,
    PrerequisiteDefinition, ProgressSettings, RuntimeSettings, Settings,
};

pub use loader::{
    builtin_config, find_project_root, load_config, load_config_file, parse_config,
    ConfigPaths, ConfigSource, BUILTIN_PREREQUISITES, CONFIG_DIR, CONFIG_FILE,
};

pub use validator::{
    is_valid_identifier, validate, validate_config, ValidationError, JITTER_RANGE,
    SECURITY_SKIPPING_FLAGS,
};
