//! Preflight - prerequisite verification and installation.
//!
//! Preflight checks that the external tools a project depends on are
//! installed, installs what is missing, and reports progress as one
//! stream. Checks are cached, and tools that live inside a runtime
//! manager (one copy per Node version, say) are checked once per version.
//!
//! # Modules
//!
//! - [`cache`] - TTL + LRU cache with collision-free keys
//! - [`cli`] - Command-line interface and argument parsing
//! - [`clock`] - Time source, swappable in tests
//! - [`config`] - Prerequisite definitions: loading, parsing, and validation
//! - [`error`] - Error types and result aliases
//! - [`prerequisites`] - Checker, installer, version resolver, and manager
//! - [`progress`] - Progress events, sinks, and the progress unifier
//! - [`shell`] - Subprocess execution
//! - [`ui`] - Terminal output, tables, and the progress bar
//!
//! # Example
//!
//! ```
//! use preflight::cache::{CacheKey, CacheStore};
//! use std::time::Duration;
//!
//! let cache: CacheStore<&str> = CacheStore::new(16, 0.10);
//! let key = CacheKey::version("aio-cli", "20").unwrap();
//! cache.set(key.clone(), "10.1.0", Duration::from_secs(60));
//! assert_eq!(cache.get(&key), Some("10.1.0"));
//! assert!(cache.get(&CacheKey::version("aio-cli", "18").unwrap()).is_none());
//! ```
//!
//! For checking and installing, see [`prerequisites::PrerequisiteManager`].

pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod prerequisites;
pub mod progress;
pub mod shell;
pub mod ui;

pub use error::{PreflightError, Result};
