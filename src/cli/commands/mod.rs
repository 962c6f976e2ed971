//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait and is routed by the
//! [`CommandDispatcher`], which loads the prerequisites file and builds
//! the [`PrerequisiteManager`](crate::prerequisites::PrerequisiteManager)
//! the command runs against.

pub mod check;
pub mod completions;
pub mod dispatcher;
pub mod display;
pub mod install;
pub mod list;

pub use dispatcher::{Command, CommandDispatcher, CommandResult};
