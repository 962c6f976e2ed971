//! Scriptable command runner for tests.
//!
//! [`MockRunner`] answers commands from a list of substring rules and
//! records every invocation with start/finish sequence numbers, so tests
//! can assert both what ran and how invocations overlapped.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::command::{CommandOutput, CommandRunner, RunError, RunOptions, EXIT_NOT_FOUND};

/// Scripted reply to a command.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// The command ran and exited.
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    /// The command exceeded its timeout.
    Timeout,
    /// The command could not be spawned.
    SpawnError(String),
}

impl MockResponse {
    /// Exit 0 with the given stdout.
    pub fn ok(stdout: &str) -> Self {
        Self::Exit {
            code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    /// Exit with `code` and the given stderr.
    pub fn fail(code: i32, stderr: &str) -> Self {
        Self::Exit {
            code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    /// Exit 127 as a shell does for an unknown program.
    pub fn not_found() -> Self {
        Self::fail(EXIT_NOT_FOUND, "command not found")
    }
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// The command string as received.
    pub command: String,
    /// Whether it was routed through the shell.
    pub use_shell: bool,
    /// Sequence number taken when the call started.
    pub started: u64,
    /// Sequence number taken when the call finished.
    pub finished: u64,
}

struct Rule {
    pattern: String,
    responses: VecDeque<MockResponse>,
}

/// A [`CommandRunner`] that never spawns processes.
pub struct MockRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Duration,
    seq: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockRunner {
    /// Create a runner that answers every unmatched command with exit 127.
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            seq: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Reply to commands containing `pattern`.
    ///
    /// Registering the same pattern again queues another reply; the last
    /// reply repeats once the queue is down to one.
    pub fn on(self, pattern: &str, response: MockResponse) -> Self {
        {
            let mut rules = lock(&self.rules);
            match rules.iter_mut().find(|r| r.pattern == pattern) {
                Some(rule) => rule.responses.push_back(response),
                None => rules.push(Rule {
                    pattern: pattern.to_string(),
                    responses: VecDeque::from([response]),
                }),
            }
        }
        self
    }

    /// Make every call take this long (tokio time).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// All recorded calls, in completion order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Total number of invocations.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Number of invocations whose command contains `pattern`.
    pub fn count_matching(&self, pattern: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.command.contains(pattern))
            .count()
    }

    /// The recorded call for the first command containing `pattern`.
    pub fn find(&self, pattern: &str) -> Option<RecordedCall> {
        lock(&self.calls)
            .iter()
            .find(|c| c.command.contains(pattern))
            .cloned()
    }

    /// Highest number of calls that were in flight at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn respond(&self, command: &str) -> MockResponse {
        let mut rules = lock(&self.rules);
        let Some(rule) = rules.iter_mut().find(|r| command.contains(&r.pattern)) else {
            return MockResponse::not_found();
        };
        if rule.responses.len() > 1 {
            rule.responses
                .pop_front()
                .unwrap_or_else(MockResponse::not_found)
        } else {
            rule.responses
                .front()
                .cloned()
                .unwrap_or_else(MockResponse::not_found)
        }
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        command: &str,
        options: &RunOptions,
    ) -> std::result::Result<CommandOutput, RunError> {
        let started = self.seq.fetch_add(1, Ordering::SeqCst);
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }

        let response = self.respond(command);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let finished = self.seq.fetch_add(1, Ordering::SeqCst);
        lock(&self.calls).push(RecordedCall {
            command: command.to_string(),
            use_shell: options.use_shell,
            started,
            finished,
        });

        match response {
            MockResponse::Exit {
                code,
                stdout,
                stderr,
            } => Ok(CommandOutput {
                exit_code: Some(code),
                stdout,
                stderr,
                duration: self.delay,
            }),
            MockResponse::Timeout => Err(RunError::Timeout {
                command: command.to_string(),
                timeout: options.timeout,
            }),
            MockResponse::SpawnError(message) => Err(RunError::Spawn {
                command: command.to_string(),
                kind: ErrorKind::Other,
                message,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPTS: RunOptions = RunOptions {
        timeout: Duration::from_secs(1),
        use_shell: true,
    };

    #[tokio::test]
    async fn unmatched_command_is_not_found() {
        let runner = MockRunner::new();
        let output = runner.run("aio --version", &OPTS).await.unwrap();
        assert!(output.not_found());
    }

    #[tokio::test]
    async fn matches_by_substring() {
        let runner = MockRunner::new().on("git --version", MockResponse::ok("git version 2.43.0"));
        let output = runner.run("git --version", &OPTS).await.unwrap();
        assert!(output.success());
        assert!(output.stdout.contains("2.43.0"));
    }

    #[tokio::test]
    async fn queued_responses_then_repeat_last() {
        let runner = MockRunner::new()
            .on("npm install", MockResponse::fail(1, "ETIMEDOUT"))
            .on("npm install", MockResponse::ok("added 1 package"));

        assert!(!runner.run("npm install x", &OPTS).await.unwrap().success());
        assert!(runner.run("npm install x", &OPTS).await.unwrap().success());
        assert!(runner.run("npm install x", &OPTS).await.unwrap().success());
    }

    #[tokio::test]
    async fn scripted_failures() {
        let runner = MockRunner::new()
            .on("slow", MockResponse::Timeout)
            .on("broken", MockResponse::SpawnError("no shell".into()));

        assert!(matches!(
            runner.run("slow", &OPTS).await,
            Err(RunError::Timeout { .. })
        ));
        assert!(matches!(
            runner.run("broken", &OPTS).await,
            Err(RunError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn records_calls() {
        let runner = MockRunner::new();
        let _ = runner.run("a", &OPTS).await;
        let _ = runner.run("b", &OPTS).await;

        assert_eq!(runner.call_count(), 2);
        assert_eq!(runner.count_matching("a"), 1);
        let a = runner.find("a").unwrap();
        let b = runner.find("b").unwrap();
        assert!(a.finished < b.started);
        assert!(a.use_shell);
    }

    #[tokio::test(start_paused = true)]
    async fn tracks_concurrency() {
        let runner = MockRunner::new().with_delay(Duration::from_millis(50));
        let (_, _) = tokio::join!(runner.run("a", &OPTS), runner.run("b", &OPTS));
        assert_eq!(runner.max_concurrency(), 2);
    }
}
