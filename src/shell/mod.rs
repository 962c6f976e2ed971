//! Subprocess execution.
//!
//! Every check and install goes through the [`CommandRunner`] trait so the
//! orchestrator can be driven by real processes ([`ShellRunner`]) or by a
//! scripted [`MockRunner`] in tests.

pub mod command;
pub mod mock;
pub mod platform;

pub use command::{
    tail, CommandOutput, CommandRunner, RunError, RunOptions, ShellRunner, EXIT_NOT_FOUND,
};
pub use mock::{MockResponse, MockRunner, RecordedCall};
pub use platform::{detect_shell, is_ci, ShellInfo, ShellType};
