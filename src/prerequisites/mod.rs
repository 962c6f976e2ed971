//! Prerequisite verification and installation.
//!
//! - Status types in [`status`]
//! - Runtime version listing in [`resolver`]
//! - Cache-aware checking in [`checker`]
//! - Fast/safe installation in [`installer`]
//! - The [`PrerequisiteManager`] that owns them in [`manager`]

pub mod checker;
pub mod installer;
pub mod manager;
pub mod resolver;
pub mod status;

pub use checker::{extract_version, render_check_command, PrerequisiteChecker, VERSION_PLACEHOLDER};
pub use installer::{
    plan_install, render_install_command, AttemptOutcome, FlagProfile, InstallAttempt,
    InstallResult, InstallTarget, Installer, PlannedStep, StepResult, FLAGS_PLACEHOLDER,
};
pub use manager::PrerequisiteManager;
pub use resolver::{
    parse_version_list, select_targets, ManagerVersionResolver, StaticVersionResolver,
    VersionResolver, VersionTarget,
};
pub use status::{
    CacheValue, CheckFailure, CheckRecord, PluginStatus, PrerequisiteStatus, StatusReport,
    Verification, VersionResult,
};
