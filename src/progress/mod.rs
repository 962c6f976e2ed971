//! Progress unification.
//!
//! Checks and installs are made of many steps, some running concurrently.
//! A [`ProgressUnifier`] turns them into one ordered stream of
//! [`ProgressEvent`]s delivered to a caller-supplied [`ProgressSink`]:
//!
//! - a start event, milestone events, and a final completed/failed event
//! - progress values that never decrease
//! - concurrent units mapped into a sub-range with [`Phase`]
//! - an elapsed-time annotation once the operation turns slow

pub mod event;
pub mod phase;
pub mod sink;
pub mod unifier;

pub use event::{format_elapsed, Milestone, ProgressEvent};
pub use phase::Phase;
pub use sink::{ChannelSink, NullSink, ProgressSink, RecordingSink};
pub use unifier::{ProgressState, ProgressUnifier, DEFAULT_ELAPSED_THRESHOLD};
