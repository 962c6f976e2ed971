//! Cache keys.
//!
//! Keys are typed rather than free-form strings. Every component is
//! validated on construction so the rendered form (`id`, `id::18`,
//! `id::plugin::mesh`) is injective: a component may not be empty, may not
//! contain [`SEPARATOR`], and may not start or end with `:` (which would
//! fuse with a neighbouring separator).

use std::fmt;

use crate::error::{PreflightError, Result};

/// Reserved separator between key components.
pub const SEPARATOR: &str = "::";

/// Key for a single cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Result of a non-versioned prerequisite check.
    Prerequisite { id: String },
    /// Result of a prerequisite check against one runtime version.
    Version { id: String, version: String },
    /// Result of a plugin check belonging to a prerequisite.
    Plugin { id: String, plugin: String },
    /// The list of runtime versions reported by a version manager.
    InstalledVersions { manager: String },
}

impl CacheKey {
    /// Key for a non-versioned prerequisite.
    pub fn prerequisite(id: &str) -> Result<Self> {
        validate_component(id)?;
        Ok(Self::Prerequisite { id: id.to_string() })
    }

    /// Key for a prerequisite checked against a specific runtime version.
    pub fn version(id: &str, version: &str) -> Result<Self> {
        validate_component(id)?;
        validate_component(version)?;
        Ok(Self::Version {
            id: id.to_string(),
            version: version.to_string(),
        })
    }

    /// Key for a plugin of a prerequisite.
    pub fn plugin(id: &str, plugin: &str) -> Result<Self> {
        validate_component(id)?;
        validate_component(plugin)?;
        Ok(Self::Plugin {
            id: id.to_string(),
            plugin: plugin.to_string(),
        })
    }

    /// Key for the installed-versions listing of a runtime manager.
    pub fn installed_versions(manager: &str) -> Result<Self> {
        validate_component(manager)?;
        Ok(Self::InstalledVersions {
            manager: manager.to_string(),
        })
    }

    /// The prerequisite this key belongs to, if any.
    pub fn prerequisite_id(&self) -> Option<&str> {
        match self {
            Self::Prerequisite { id } | Self::Version { id, .. } | Self::Plugin { id, .. } => {
                Some(id)
            }
            Self::InstalledVersions { .. } => None,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prerequisite { id } => write!(f, "{}", id),
            Self::Version { id, version } => write!(f, "{}{}{}", id, SEPARATOR, version),
            Self::Plugin { id, plugin } => {
                write!(f, "{}{}plugin{}{}", id, SEPARATOR, SEPARATOR, plugin)
            }
            Self::InstalledVersions { manager } => {
                write!(f, "{}versions{}{}", SEPARATOR, SEPARATOR, manager)
            }
        }
    }
}

/// Check that a key component cannot collide with the separator.
pub fn validate_component(component: &str) -> Result<()> {
    let reason = if component.is_empty() {
        "component is empty"
    } else if component.contains(SEPARATOR) {
        "contains the reserved separator"
    } else if component.starts_with(':') || component.ends_with(':') {
        "begins or ends with ':'"
    } else {
        return Ok(());
    };

    Err(PreflightError::MalformedCacheKey {
        component: component.to_string(),
        reason: reason.to_string(),
    })
}
