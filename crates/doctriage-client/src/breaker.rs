//! Circuit breaker for the classification service.
//!
//! Tracks consecutive failures across calls. After
//! [`BreakerConfig::failure_threshold`] failures the breaker opens and
//! short-circuits every attempt for the cool-down period, after which a
//! single probe call is allowed through. A successful probe closes the
//! breaker; a failed probe re-opens it for another cool-down.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::{ClientError, Result};

/// Configuration for the circuit breaker.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens (default: 5).
    pub failure_threshold: u32,
    /// How long the breaker stays open before allowing a probe
    /// (default: 30 seconds).
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
enum BreakerState {
    /// Normal operation, counting consecutive failures.
    Closed { consecutive_failures: u32 },
    /// Failing fast until the cool-down elapses.
    Open { until: Instant },
    /// One probe call is in flight; its outcome decides the next state.
    HalfOpen,
}

/// A fail-fast guard shared by all workers of one pipeline run.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a breaker with the given configuration.
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerState::Closed {
                consecutive_failures: 0,
            }),
        }
    }

    /// Check whether a call may proceed.
    ///
    /// Returns [`ClientError::CircuitOpen`] without any network attempt
    /// when the breaker is open. When the cool-down has elapsed the breaker
    /// moves to half-open and admits exactly one probe; concurrent callers
    /// keep failing fast until the probe resolves.
    pub fn check(&self) -> Result<()> {
        let mut state = self.state.lock().expect("breaker lock poisoned");
        match *state {
            BreakerState::Closed { .. } => Ok(()),
            BreakerState::Open { until } => {
                let now = Instant::now();
                if now >= until {
                    info!("circuit cool-down elapsed, admitting probe call");
                    *state = BreakerState::HalfOpen;
                    Ok(())
                } else {
                    Err(ClientError::CircuitOpen {
                        remaining_ms: (until - now).as_millis() as u64,
                    })
                }
            }
            BreakerState::HalfOpen => Err(ClientError::CircuitOpen { remaining_ms: 0 }),
        }
    }

    /// Record a successful call, closing the breaker.
    pub fn record_success(&self) {
        let mut state = self.state.lock().expect("breaker lock poisoned");
        if matches!(*state, BreakerState::HalfOpen) {
            info!("probe call succeeded, circuit closed");
        }
        *state = BreakerState::Closed {
            consecutive_failures: 0,
        };
    }

    /// Record a failed call.
    ///
    /// In the closed state this increments the consecutive-failure count
    /// and opens the breaker at the threshold. A failed probe re-opens the
    /// breaker for a fresh cool-down.
    pub fn record_failure(&self) {
        let mut state = self.state.lock().expect("breaker lock poisoned");
        match *state {
            BreakerState::Closed {
                consecutive_failures,
            } => {
                let failures = consecutive_failures + 1;
                if failures >= self.config.failure_threshold {
                    warn!(
                        failures,
                        cooldown_secs = self.config.cooldown.as_secs(),
                        "failure threshold reached, circuit opened"
                    );
                    *state = BreakerState::Open {
                        until: Instant::now() + self.config.cooldown,
                    };
                } else {
                    *state = BreakerState::Closed {
                        consecutive_failures: failures,
                    };
                }
            }
            BreakerState::HalfOpen => {
                warn!(
                    cooldown_secs = self.config.cooldown.as_secs(),
                    "probe call failed, circuit re-opened"
                );
                *state = BreakerState::Open {
                    until: Instant::now() + self.config.cooldown,
                };
            }
            // Failures reported by calls that were already in flight when
            // the breaker opened; the open state stands.
            BreakerState::Open { .. } => {}
        }
    }

    /// Release a half-open probe slot without an outcome.
    ///
    /// A cancelled or budget-limited probe says nothing about service
    /// health, but leaving the breaker half-open would fail every later
    /// call fast with no way to recover. Re-open for a fresh cool-down so
    /// a later call can probe again. No-op outside the half-open state.
    pub fn abort_probe(&self) {
        let mut state = self.state.lock().expect("breaker lock poisoned");
        if matches!(*state, BreakerState::HalfOpen) {
            info!(
                cooldown_secs = self.config.cooldown.as_secs(),
                "probe call inconclusive, circuit re-opened"
            );
            *state = BreakerState::Open {
                until: Instant::now() + self.config.cooldown,
            };
        }
    }

    /// Returns `true` if the breaker currently fails fast.
    pub fn is_open(&self) -> bool {
        let state = self.state.lock().expect("breaker lock poisoned");
        matches!(*state, BreakerState::Open { until } if Instant::now() < until)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
