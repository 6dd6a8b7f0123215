use super::{CommandOutcome, CommandRunner};
use crate::cancel::Cancellation;
use async_trait::async_trait;
use ripple_core::{Result, WorkItem};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Start or end of a mock invocation, in the order they happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Started(String),
    Finished(String),
}

/// Dry-run adapter: logs the command and reports success without running it.
///
/// Failures and delays can be scripted per item, which makes it the
/// scheduler's test double as well.
#[derive(Debug, Default)]
pub struct MockRunner {
    /// item -> (exit code, how many more invocations fail)
    failures: Mutex<HashMap<String, (i32, u32)>>,
    delays: HashMap<String, Duration>,
    events: Mutex<Vec<MockEvent>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every invocation of `name` exits with `code`
    pub fn failing(self, name: &str, code: i32) -> Self {
        self.failing_times(name, code, u32::MAX)
    }

    /// The first `times` invocations of `name` exit with `code`
    pub fn failing_times(self, name: &str, code: i32, times: u32) -> Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(name.to_string(), (code, times));
        }
        self
    }

    pub fn with_delay(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// How many times `name` was started
    pub fn invocations(&self, name: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, MockEvent::Started(n) if n == name))
            .count()
    }

    fn record(&self, event: MockEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    fn next_exit_code(&self, name: &str) -> i32 {
        let Ok(mut failures) = self.failures.lock() else {
            return 0;
        };
        match failures.get_mut(name) {
            Some((code, remaining)) if *remaining > 0 => {
                *remaining -= 1;
                *code
            }
            _ => 0,
        }
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, item: &WorkItem, cancel: &Cancellation) -> Result<CommandOutcome> {
        if cancel.is_cancelled() {
            return Ok(CommandOutcome::cancelled());
        }
        tracing::info!(item = %item.name, command = %item.command, "mock run");
        self.record(MockEvent::Started(item.name.clone()));

        if let Some(delay) = self.delays.get(&item.name) {
            tokio::select! {
                _ = tokio::time::sleep(*delay) => {}
                _ = cancel.cancelled() => {
                    self.record(MockEvent::Finished(item.name.clone()));
                    return Ok(CommandOutcome::cancelled());
                }
            }
        }

        let code = self.next_exit_code(&item.name);
        self.record(MockEvent::Finished(item.name.clone()));
        let line = if code == 0 {
            format!("mock: {}", item.command)
        } else {
            format!("mock failure ({code})")
        };
        Ok(CommandOutcome::finished(code, line))
    }
}
