use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::constants::{BREAKER_FAILURE_THRESHOLD, BREAKER_RESET_SECS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_started_at: Option<Instant>,
}

/// Stops hammering an upstream that keeps failing at the transport level.
///
/// Opens after `failure_threshold` consecutive failures, lets a single trial
/// call through once `reset_after` has elapsed, and closes again on the first
/// success. A trial that never reports back is replaced after another
/// `reset_after`.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_after: Duration,
    inner: Mutex<Inner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(
            BREAKER_FAILURE_THRESHOLD,
            Duration::from_secs(BREAKER_RESET_SECS),
        )
    }
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_after: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            reset_after,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_started_at: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Whether a call may go out now. Moves Open to HalfOpen once the reset
    /// window has passed.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                let trial_pending = inner
                    .trial_started_at
                    .is_some_and(|at| at.elapsed() < self.reset_after);
                if !trial_pending {
                    inner.trial_started_at = Some(Instant::now());
                }
                !trial_pending
            }
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.reset_after)
                    .unwrap_or(true);
                if elapsed {
                    log::info!("circuit half-open, letting a trial request through");
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_started_at = Some(Instant::now());
                }
                elapsed
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            log::info!("upstream recovered, circuit closed");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_started_at = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        let trip = match inner.state {
            CircuitState::Closed => inner.consecutive_failures >= self.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };
        if trip {
            log::warn!(
                "circuit opened after {} consecutive upstream failures",
                inner.consecutive_failures
            );
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            inner.trial_started_at = None;
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }
}
