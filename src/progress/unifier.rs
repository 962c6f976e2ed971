//! One coherent progress stream for a multi-step operation.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::clock::{Clock, SystemClock};
use crate::error::{PreflightError, Result};

use super::event::{format_elapsed, Milestone, ProgressEvent};
use super::phase::Phase;
use super::sink::ProgressSink;

/// Default elapsed time after which events carry an elapsed annotation.
pub const DEFAULT_ELAPSED_THRESHOLD: Duration = Duration::from_secs(30);

/// Lifecycle of a [`ProgressUnifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    Idle,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for ProgressState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProgressState::Idle => "idle",
            ProgressState::Running => "running",
            ProgressState::Completed => "completed",
            ProgressState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

struct Inner {
    operation: String,
    sink: Arc<dyn ProgressSink>,
    clock: Arc<dyn Clock>,
    threshold: Duration,
    state: Mutex<Tracking>,
}

struct Tracking {
    state: ProgressState,
    started: Option<Instant>,
    last_progress: u8,
    last_event: Option<ProgressEvent>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Tracking> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn elapsed_annotation(&self, started: Option<Instant>) -> Option<String> {
        let elapsed = self.clock.now().saturating_duration_since(started?);
        (elapsed > self.threshold).then(|| format_elapsed(elapsed))
    }

    fn emit_locked(
        &self,
        tracking: &mut Tracking,
        progress: u8,
        message: &str,
        milestone: Option<Milestone>,
    ) {
        let progress = progress.min(100).max(tracking.last_progress);
        tracking.last_progress = progress;

        let event = ProgressEvent {
            operation: self.operation.clone(),
            progress,
            message: message.to_string(),
            milestone,
            elapsed: self.elapsed_annotation(tracking.started),
        };
        tracking.last_event = Some(event.clone());
        self.sink.emit(event);
    }

    /// Re-emit the latest event with a fresh elapsed annotation.
    ///
    /// Returns false once the operation is no longer running.
    fn heartbeat(&self) -> bool {
        let mut tracking = self.lock();
        if tracking.state != ProgressState::Running {
            return false;
        }
        if let Some(mut event) = tracking.last_event.clone() {
            event.elapsed = self.elapsed_annotation(tracking.started);
            tracking.last_event = Some(event.clone());
            self.sink.emit(event);
        }
        true
    }
}

/// Turns concurrent, multi-step work into a single event stream.
///
/// The unifier moves `Idle -> Running -> Completed | Failed`. Events are
/// only accepted while running, progress never decreases, and once the
/// operation has been running longer than the elapsed threshold every
/// event carries an elapsed annotation.
///
/// When a heartbeat interval is set, a background task re-emits the latest
/// event while the operation runs. The task is aborted on completion,
/// failure, reset, and drop.
pub struct ProgressUnifier {
    inner: Arc<Inner>,
    heartbeat_interval: Option<Duration>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl ProgressUnifier {
    /// Create an idle unifier reporting to `sink`.
    pub fn new(operation: impl Into<String>, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                operation: operation.into(),
                sink,
                clock: Arc::new(SystemClock),
                threshold: DEFAULT_ELAPSED_THRESHOLD,
                state: Mutex::new(Tracking {
                    state: ProgressState::Idle,
                    started: None,
                    last_progress: 0,
                    last_event: None,
                }),
            }),
            heartbeat_interval: None,
            heartbeat: Mutex::new(None),
        }
    }

    fn inner_mut(&mut self) -> Option<&mut Inner> {
        Arc::get_mut(&mut self.inner)
    }

    /// Read time from `clock`. Builder methods apply before `begin` only.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        if let Some(inner) = self.inner_mut() {
            inner.clock = clock;
        }
        self
    }

    /// Annotate events with elapsed time once it exceeds `threshold`.
    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        if let Some(inner) = self.inner_mut() {
            inner.threshold = threshold;
        }
        self
    }

    /// Re-emit the latest event every `interval` while running.
    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = (!interval.is_zero()).then_some(interval);
        self
    }

    pub fn operation(&self) -> &str {
        &self.inner.operation
    }

    pub fn state(&self) -> ProgressState {
        self.inner.lock().state
    }

    /// Time since `begin`, if started.
    pub fn elapsed(&self) -> Option<Duration> {
        let started = self.inner.lock().started?;
        Some(self.inner.clock.now().saturating_duration_since(started))
    }

    /// Latest progress value emitted.
    pub fn progress(&self) -> u8 {
        self.inner.lock().last_progress
    }

    fn state_error(&self, state: ProgressState, expected: ProgressState) -> PreflightError {
        PreflightError::ProgressState {
            operation: self.inner.operation.clone(),
            state: state.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Start the operation and emit the first event at 0%.
    ///
    /// # Errors
    ///
    /// Returns `ProgressState` unless the unifier is idle.
    pub fn begin(&self, message: &str) -> Result<()> {
        {
            let mut tracking = self.inner.lock();
            if tracking.state != ProgressState::Idle {
                return Err(self.state_error(tracking.state, ProgressState::Idle));
            }
            tracking.state = ProgressState::Running;
            tracking.started = Some(self.inner.clock.now());
            tracking.last_progress = 0;
            tracking.last_event = None;
            self.inner.emit_locked(&mut *tracking, 0, message, None);
        }
        self.start_heartbeat();
        Ok(())
    }

    fn with_running<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&Inner, &mut Tracking),
    {
        let mut tracking = self.inner.lock();
        if tracking.state != ProgressState::Running {
            return Err(self.state_error(tracking.state, ProgressState::Running));
        }
        f(&self.inner, &mut *tracking);
        Ok(())
    }

    /// Report progress. Values below the last emitted value are raised to it.
    pub fn update(&self, progress: u8, message: &str) -> Result<()> {
        self.with_running(|inner, tracking| inner.emit_locked(tracking, progress, message, None))
    }

    /// Report reaching step `current` of `total`.
    pub fn milestone(&self, progress: u8, message: &str, current: usize, total: usize) -> Result<()> {
        self.with_running(|inner, tracking| {
            inner.emit_locked(
                tracking,
                progress,
                message,
                Some(Milestone::new(current, total)),
            )
        })
    }

    /// Report that `done` units of `phase` have finished.
    pub fn advance(&self, phase: &Phase, done: usize, message: &str) -> Result<()> {
        self.update(phase.completed(done), message)
    }

    /// Finish successfully at 100%.
    pub fn complete(&self, message: &str) -> Result<()> {
        self.with_running(|inner, tracking| {
            inner.emit_locked(tracking, 100, message, None);
            tracking.state = ProgressState::Completed;
        })?;
        self.stop_heartbeat();
        Ok(())
    }

    /// Finish with a failure, keeping the last progress value.
    pub fn fail(&self, message: &str) -> Result<()> {
        self.with_running(|inner, tracking| {
            let progress = tracking.last_progress;
            inner.emit_locked(tracking, progress, message, None);
            tracking.state = ProgressState::Failed;
        })?;
        self.stop_heartbeat();
        Ok(())
    }

    /// Return to idle from any state without emitting.
    pub fn reset(&self) {
        self.stop_heartbeat();
        let mut tracking = self.inner.lock();
        tracking.state = ProgressState::Idle;
        tracking.started = None;
        tracking.last_progress = 0;
        tracking.last_event = None;
    }

    /// Run `operation` between `begin` and `complete`/`fail`.
    ///
    /// The unifier always leaves the running state, whichever way the
    /// operation ends.
    pub async fn track<T, F>(&self, message: &str, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.begin(message)?;
        match operation.await {
            Ok(value) => {
                self.complete("Done")?;
                Ok(value)
            }
            Err(e) => {
                self.fail(&e.to_string())?;
                Err(e)
            }
        }
    }

    fn start_heartbeat(&self) {
        let Some(interval) = self.heartbeat_interval else {
            return;
        };
        // Heartbeats need a runtime; without one the operation simply has none.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No tokio runtime, heartbeat disabled");
            return;
        };

        let inner = Arc::clone(&self.inner);
        let task = handle.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !inner.heartbeat() {
                    break;
                }
            }
        });

        let mut slot = self.heartbeat.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = slot.replace(task) {
            old.abort();
        }
    }

    fn stop_heartbeat(&self) {
        let task = self
            .heartbeat
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }

    /// Whether a heartbeat task is currently attached.
    pub fn has_heartbeat(&self) -> bool {
        self.heartbeat
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }
}

impl Drop for ProgressUnifier {
    fn drop(&mut self) {
        self.stop_heartbeat();
    }
}

impl fmt::Debug for ProgressUnifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressUnifier")
            .field("operation", &self.inner.operation)
            .field("state", &self.state())
            .field("progress", &self.progress())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::progress::sink::RecordingSink;

    fn unifier() -> (ProgressUnifier, RecordingSink, Arc<ManualClock>) {
        let sink = RecordingSink::new();
        let clock = Arc::new(ManualClock::new());
        let unifier =
            ProgressUnifier::new("check", Arc::new(sink.clone())).with_clock(clock.clone());
        (unifier, sink, clock)
    }

    #[test]
    fn lifecycle_emits_start_and_end() {
        let (unifier, sink, _) = unifier();
        assert_eq!(unifier.state(), ProgressState::Idle);

        unifier.begin("Starting").unwrap();
        assert_eq!(unifier.state(), ProgressState::Running);
        unifier.update(50, "Halfway").unwrap();
        unifier.complete("Done").unwrap();

        assert_eq!(unifier.state(), ProgressState::Completed);
        assert_eq!(sink.progress_values(), vec![0, 50, 100]);
        assert!(sink.events().iter().all(|e| e.operation == "check"));
    }

    #[test]
    fn begin_twice_is_rejected() {
        let (unifier, _, _) = unifier();
        unifier.begin("a").unwrap();
        let err = unifier.begin("b").unwrap_err();
        assert!(matches!(err, PreflightError::ProgressState { .. }));
    }

    #[test]
    fn begin_after_completion_requires_reset() {
        let (unifier, sink, _) = unifier();
        unifier.begin("a").unwrap();
        unifier.complete("done").unwrap();
        assert!(unifier.begin("again").is_err());

        unifier.reset();
        assert_eq!(unifier.state(), ProgressState::Idle);
        unifier.begin("again").unwrap();
        assert_eq!(sink.progress_values().last(), Some(&0));
    }

    #[test]
    fn events_rejected_when_not_running() {
        let (unifier, sink, _) = unifier();
        assert!(unifier.update(10, "early").is_err());
        assert!(unifier.complete("early").is_err());
        assert!(unifier.fail("early").is_err());
        assert!(sink.is_empty());
    }

    #[test]
    fn progress_never_decreases() {
        let (unifier, sink, _) = unifier();
        unifier.begin("start").unwrap();
        unifier.update(40, "a").unwrap();
        unifier.update(20, "b").unwrap();
        unifier.update(250, "c").unwrap();
        assert_eq!(sink.progress_values(), vec![0, 40, 40, 100]);
    }

    #[test]
    fn fail_keeps_progress_and_state() {
        let (unifier, sink, _) = unifier();
        unifier.begin("start").unwrap();
        unifier.update(30, "working").unwrap();
        unifier.fail("boom").unwrap();

        assert_eq!(unifier.state(), ProgressState::Failed);
        let last = sink.events().pop().unwrap();
        assert_eq!(last.progress, 30);
        assert_eq!(last.message, "boom");
    }

    #[test]
    fn milestone_is_attached() {
        let (unifier, sink, _) = unifier();
        unifier.begin("start").unwrap();
        unifier.milestone(20, "Checking Git", 1, 5).unwrap();
        let event = sink.events().pop().unwrap();
        assert_eq!(event.milestone, Some(Milestone::new(1, 5)));
    }

    #[test]
    fn elapsed_appears_only_after_threshold() {
        let (unifier, sink, clock) = unifier();
        unifier.begin("start").unwrap();
        clock.advance(Duration::from_secs(30));
        unifier.update(10, "at threshold").unwrap();
        clock.advance(Duration::from_secs(45));
        unifier.update(20, "slow").unwrap();

        let events = sink.events();
        assert!(events[0].elapsed.is_none());
        assert!(events[1].elapsed.is_none());
        assert_eq!(events[2].elapsed.as_deref(), Some("1m 15s"));
    }

    #[test]
    fn fast_operations_never_show_elapsed() {
        let (unifier, sink, clock) = unifier();
        unifier.begin("start").unwrap();
        clock.advance(Duration::from_secs(5));
        unifier.complete("done").unwrap();
        assert!(sink.events().iter().all(|e| e.elapsed.is_none()));
    }

    #[test]
    fn custom_threshold() {
        let (unifier, sink, clock) = unifier();
        let unifier = unifier.with_threshold(Duration::from_secs(1));
        unifier.begin("start").unwrap();
        clock.advance(Duration::from_secs(2));
        unifier.complete("done").unwrap();
        assert_eq!(sink.events()[1].elapsed.as_deref(), Some("2s"));
    }

    #[test]
    fn phase_values_are_bounded_and_monotonic() {
        let (unifier, sink, _) = unifier();
        unifier.begin("start").unwrap();
        unifier.update(16, "phase").unwrap();

        let phase = Phase::new(16, 30, 3);
        for done in 1..=3 {
            unifier.advance(&phase, done, "unit done").unwrap();
        }

        let values = sink.progress_values();
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert!(values[1..].iter().all(|v| (16..=30).contains(v)));
        assert_eq!(values.last(), Some(&30));
    }

    #[tokio::test]
    async fn track_completes_on_success() {
        let (unifier, sink, _) = unifier();
        let value = unifier.track("work", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(unifier.state(), ProgressState::Completed);
        assert_eq!(sink.progress_values().last(), Some(&100));
    }

    #[tokio::test]
    async fn track_fails_on_error() {
        let (unifier, _, _) = unifier();
        let result: Result<()> = unifier
            .track("work", async {
                Err(PreflightError::UnknownPrerequisite { id: "x".into() })
            })
            .await;
        assert!(result.is_err());
        assert_eq!(unifier.state(), ProgressState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_reemits_until_complete() {
        let (unifier, sink, _) = unifier();
        let unifier = unifier.with_heartbeat(Duration::from_millis(10));

        unifier.begin("start").unwrap();
        assert!(unifier.has_heartbeat());
        tokio::time::sleep(Duration::from_millis(35)).await;
        let during = sink.len();
        assert!(during >= 3, "expected heartbeats, got {}", during);

        unifier.complete("done").unwrap();
        assert!(!unifier.has_heartbeat());
        let after_complete = sink.len();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.len(), after_complete);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_stops_on_failure_and_drop() {
        let (unifier, sink, _) = unifier();
        let unifier = unifier.with_heartbeat(Duration::from_millis(10));
        unifier.begin("start").unwrap();
        unifier.fail("boom").unwrap();
        assert!(!unifier.has_heartbeat());

        let (dropped, dropped_sink, _) = self::unifier();
        let dropped = dropped.with_heartbeat(Duration::from_millis(10));
        dropped.begin("start").unwrap();
        drop(dropped);
        let count = dropped_sink.len();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(dropped_sink.len(), count);

        let count = sink.len();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.len(), count);
    }

    #[test]
    fn heartbeat_without_runtime_is_skipped() {
        let (unifier, _, _) = unifier();
        let unifier = unifier.with_heartbeat(Duration::from_millis(10));
        unifier.begin("start").unwrap();
        assert!(!unifier.has_heartbeat());
    }
}
