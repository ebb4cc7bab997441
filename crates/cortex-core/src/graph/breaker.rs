//! Process-wide circuit breaker for the graph store.
//!
//! Two states. CLOSED admits every call. Once `failure_threshold`
//! consecutive failures are recorded the breaker is OPEN and rejects calls
//! until `reset_timeout` has passed since the most recent failure. The first
//! call after that zeroes the counter and is admitted as a probe; there is no
//! separate half-open limit, so concurrent callers may all probe at once.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::BreakerConfig;

/// Outcome of asking the breaker for admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Breaker is closed
    Closed,
    /// Breaker was open and its reset timeout elapsed; the counter was reset
    Probe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
}

pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    failure_count: AtomicU32,
    origin: Instant,
    /// Milliseconds since `origin` of the last failure, plus one. Zero means
    /// no failure recorded.
    last_failure: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(config: &BreakerConfig) -> Self {
        Self::with_settings(config.failure_threshold, config.reset_timeout())
    }

    pub fn with_settings(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            failure_count: AtomicU32::new(0),
            origin: Instant::now(),
            last_failure: AtomicU64::new(0),
        }
    }

    /// Ask for admission. `Err` carries the time left until the next probe.
    pub fn admit(&self) -> Result<Admission, Duration> {
        if self.failure_count.load(Ordering::SeqCst) < self.failure_threshold {
            return Ok(Admission::Closed);
        }

        let elapsed = self.since_last_failure().unwrap_or(Duration::MAX);
        if elapsed < self.reset_timeout {
            return Err(self.reset_timeout - elapsed);
        }

        self.failure_count.store(0, Ordering::SeqCst);
        Ok(Admission::Probe)
    }

    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::SeqCst);
    }

    pub fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::SeqCst);
        let offset = Instant::now().saturating_duration_since(self.origin).as_millis() as u64;
        self.last_failure.store(offset + 1, Ordering::SeqCst);
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::SeqCst)
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn state(&self) -> BreakerState {
        if self.failure_count() >= self.failure_threshold {
            BreakerState::Open
        } else {
            BreakerState::Closed
        }
    }

    fn since_last_failure(&self) -> Option<Duration> {
        match self.last_failure.load(Ordering::SeqCst) {
            0 => None,
            stamp => {
                let at = self.origin + Duration::from_millis(stamp - 1);
                Some(Instant::now().saturating_duration_since(at))
            }
        }
    }
}

/// Whole seconds until retry, rounded up
pub fn retry_after_secs(remaining: Duration) -> u64 {
    let secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 { secs + 1 } else { secs }
}
