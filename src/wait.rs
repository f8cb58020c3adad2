//! Wait strategies for streaming consumption.
//!
//! Whenever the claim loop comes up empty, it hands control to a
//! [`WaitPolicy`]: the policy performs the actual suspension and decides
//! whether the stream keeps going. Injectable so tests can substitute
//! deterministic, bounded termination for real delays.

use std::time::Duration;

use async_trait::async_trait;

/// Invoked on every empty poll of the claim loop.
#[async_trait]
pub trait WaitPolicy: Send {
    /// Suspend until the next poll should happen. Returns `true` to keep
    /// waiting for work, `false` to end the stream.
    async fn wait(&mut self) -> bool;
}

/// Sleep a fixed delay between empty polls, forever.
pub struct FixedDelay {
    delay: Duration,
    quiet: bool,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            quiet: false,
        }
    }

    /// Suppress the per-poll "waiting for work" log line.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl WaitPolicy for FixedDelay {
    async fn wait(&mut self) -> bool {
        tokio::time::sleep(self.delay).await;
        if !self.quiet {
            tracing::debug!("waiting for work");
        }
        true
    }
}

/// Stop after a fixed number of empty polls. No suspension between polls;
/// what tests and drain-style consumers use.
pub struct BoundedEmptyPolls {
    remaining: u32,
}

impl BoundedEmptyPolls {
    pub fn new(polls: u32) -> Self {
        Self { remaining: polls }
    }
}

#[async_trait]
impl WaitPolicy for BoundedEmptyPolls {
    async fn wait(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_polls_stop_after_the_budget() {
        let mut policy = BoundedEmptyPolls::new(2);
        assert!(policy.wait().await);
        assert!(policy.wait().await);
        assert!(!policy.wait().await);
        assert!(!policy.wait().await);
    }

    #[tokio::test]
    async fn zero_budget_stops_immediately() {
        let mut policy = BoundedEmptyPolls::new(0);
        assert!(!policy.wait().await);
    }
}
