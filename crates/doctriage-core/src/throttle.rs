//! Adaptive submission throttle.
//!
//! A process-wide feedback loop: workers report observed response
//! latencies, and the controller widens or narrows the minimum spacing
//! between successive submissions to the remote service. The controller
//! never sleeps itself -- callers ask for a [`wait budget`](AdaptiveThrottle::wait_budget)
//! and wait cooperatively, re-checking cancellation during the wait.
//!
//! # Algorithm
//!
//! A bounded sliding window keeps the last 10 latency samples; values
//! under 1 ms are measurement noise and are discarded. Once at least 3
//! samples exist, adaptation is enabled, and more than one worker runs:
//! a window mean above the threshold widens spacing by one step (clamped
//! to the maximum); a mean below half the threshold narrows it by one
//! step, but never below one "slot" per worker -- `max(min_spacing,
//! worker_count)` -- so true concurrency is not starved. Anything in
//! between holds spacing unchanged. With a single worker the whole loop
//! is disabled: spacing is irrelevant under full serialization.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use doctriage_types::ThrottleConfig;

/// Sliding window depth.
const WINDOW_SIZE: usize = 10;

/// Minimum samples before the feedback loop may adjust spacing.
const MIN_SAMPLES: usize = 3;

/// Samples below this are treated as measurement noise and discarded.
const NOISE_FLOOR_SECS: f64 = 0.001;

/// Consistent view of the controller state.
#[derive(Debug, Clone)]
pub struct ThrottleSnapshot {
    /// Current enforced spacing between submissions, in seconds.
    pub current_spacing: f64,
    /// Mean of the latency window, in seconds (0 when empty).
    pub avg_response_time: f64,
    /// Number of samples currently in the window.
    pub samples: usize,
    /// Submissions registered so far.
    pub submissions: u64,
    /// Whether the feedback loop is active.
    pub adaptive_enabled: bool,
}

#[derive(Debug)]
struct ThrottleState {
    current_spacing: f64,
    window: VecDeque<f64>,
    last_submission: Option<Instant>,
    submissions: u64,
}

/// Process-wide adaptive spacing controller.
///
/// All mutable state lives behind a single mutex; the struct is shared by
/// every worker of a run.
#[derive(Debug)]
pub struct AdaptiveThrottle {
    min_spacing: f64,
    max_spacing: f64,
    threshold: f64,
    step: f64,
    adaptive_enabled: bool,
    worker_count: usize,
    state: Mutex<ThrottleState>,
}

impl AdaptiveThrottle {
    /// Create a controller from configuration.
    ///
    /// The initial spacing is clamped into `[min, max]`.
    pub fn new(config: &ThrottleConfig, worker_count: usize) -> Self {
        let initial = config
            .initial_delay_seconds
            .clamp(config.min_delay_seconds, config.max_delay_seconds);
        info!(
            spacing = initial,
            threshold = config.response_time_threshold,
            workers = worker_count,
            adaptive = config.enable_adaptive_spacing,
            "throttle controller initialized"
        );
        Self {
            min_spacing: config.min_delay_seconds,
            max_spacing: config.max_delay_seconds,
            threshold: config.response_time_threshold,
            step: config.adjustment_step,
            adaptive_enabled: config.enable_adaptive_spacing,
            worker_count,
            state: Mutex::new(ThrottleState {
                current_spacing: initial,
                window: VecDeque::with_capacity(WINDOW_SIZE),
                last_submission: None,
                submissions: 0,
            }),
        }
    }

    /// Lowest spacing the controller will narrow to: one slot per worker,
    /// but never below the configured minimum.
    fn spacing_floor(&self) -> f64 {
        self.min_spacing.max(self.worker_count as f64)
    }

    /// Feed one observed response latency into the window and run the
    /// feedback step.
    pub fn record_latency(&self, seconds: f64) {
        if seconds < NOISE_FLOOR_SECS {
            warn!(seconds, "ignoring implausibly small latency sample");
            return;
        }

        let mut state = self.state.lock().expect("throttle lock poisoned");
        if state.window.len() == WINDOW_SIZE {
            state.window.pop_front();
        }
        state.window.push_back(seconds);

        if !self.adaptive_enabled || state.window.len() < MIN_SAMPLES {
            return;
        }
        if self.worker_count <= 1 {
            debug!("single worker, adaptive spacing disabled");
            return;
        }

        let mean: f64 = state.window.iter().sum::<f64>() / state.window.len() as f64;
        let floor = self.spacing_floor();

        if mean > self.threshold {
            let widened = (state.current_spacing + self.step).min(self.max_spacing);
            if widened != state.current_spacing {
                info!(
                    mean,
                    threshold = self.threshold,
                    from = state.current_spacing,
                    to = widened,
                    "service degraded, widening spacing"
                );
                state.current_spacing = widened;
            }
        } else if mean < self.threshold / 2.0 && state.current_spacing > floor {
            let narrowed = (state.current_spacing - self.step).max(floor);
            if narrowed != state.current_spacing {
                info!(
                    mean,
                    from = state.current_spacing,
                    to = narrowed,
                    "service responsive, narrowing spacing"
                );
                state.current_spacing = narrowed;
            }
        } else {
            debug!(mean, spacing = state.current_spacing, "spacing held");
        }
    }

    /// Time a caller must still wait before the next submission:
    /// `max(0, spacing - elapsed since last submission)`.
    pub fn wait_budget(&self) -> Duration {
        let state = self.state.lock().expect("throttle lock poisoned");
        Self::budget_of(&state)
    }

    /// Record that a submission is happening now.
    pub fn register_submission(&self) {
        let mut state = self.state.lock().expect("throttle lock poisoned");
        state.last_submission = Some(Instant::now());
        state.submissions += 1;
    }

    /// Atomic check-and-register: if the spacing has elapsed, register a
    /// submission and return `None`; otherwise return the remaining wait.
    ///
    /// Workers use this instead of a separate `wait_budget` +
    /// `register_submission` pair so that two of them cannot pass the gate
    /// in the same slot.
    pub fn try_begin_submission(&self) -> Option<Duration> {
        let mut state = self.state.lock().expect("throttle lock poisoned");
        let budget = Self::budget_of(&state);
        if budget.is_zero() {
            state.last_submission = Some(Instant::now());
            state.submissions += 1;
            None
        } else {
            Some(budget)
        }
    }

    fn budget_of(state: &ThrottleState) -> Duration {
        match state.last_submission {
            None => Duration::ZERO,
            Some(at) => {
                let elapsed = at.elapsed().as_secs_f64();
                if elapsed < state.current_spacing {
                    Duration::from_secs_f64(state.current_spacing - elapsed)
                } else {
                    Duration::ZERO
                }
            }
        }
    }

    /// Adaptive per-item time budget: `clamp(spacing + buffer, floor,
    /// ceiling)`.
    pub fn adaptive_timeout(&self, buffer: Duration, floor: Duration, ceiling: Duration) -> Duration {
        let state = self.state.lock().expect("throttle lock poisoned");
        let raw = state.current_spacing + buffer.as_secs_f64();
        Duration::from_secs_f64(raw.clamp(floor.as_secs_f64(), ceiling.as_secs_f64().max(floor.as_secs_f64())))
    }

    /// Current spacing in seconds.
    pub fn current_spacing(&self) -> f64 {
        self.state.lock().expect("throttle lock poisoned").current_spacing
    }

    /// Consistent snapshot for status reporting.
    pub fn snapshot(&self) -> ThrottleSnapshot {
        let state = self.state.lock().expect("throttle lock poisoned");
        let avg = if state.window.is_empty() {
            0.0
        } else {
            state.window.iter().sum::<f64>() / state.window.len() as f64
        };
        ThrottleSnapshot {
            current_spacing: state.current_spacing,
            avg_response_time: avg,
            samples: state.window.len(),
            submissions: state.submissions,
            adaptive_enabled: self.adaptive_enabled && self.worker_count > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(initial: f64, min: f64, max: f64, threshold: f64, step: f64) -> ThrottleConfig {
        ThrottleConfig {
            initial_delay_seconds: initial,
            min_delay_seconds: min,
            max_delay_seconds: max,
            response_time_threshold: threshold,
            adjustment_step: step,
            enable_adaptive_spacing: true,
            buffer_size: 2,
        }
    }

    #[test]
    fn initial_spacing_clamped() {
        let throttle = AdaptiveThrottle::new(&config(500.0, 1.0, 99.0, 5.0, 1.0), 2);
        assert!((throttle.current_spacing() - 99.0).abs() < f64::EPSILON);
    }

    #[test]
    fn slow_responses_widen_spacing_to_max() {
        let throttle = AdaptiveThrottle::new(&config(5.0, 1.0, 8.0, 5.0, 1.0), 2);
        let mut previous = throttle.current_spacing();
        for _ in 0..3 {
            throttle.record_latency(20.0);
        }
        // From the third sample on, every slow observation widens spacing
        // until the max clamp.
        for _ in 0..10 {
            throttle.record_latency(20.0);
            let current = throttle.current_spacing();
            assert!(current >= previous);
            assert!(current <= 8.0);
            previous = current;
        }
        assert!((throttle.current_spacing() - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fast_responses_narrow_spacing_to_worker_floor() {
        let throttle = AdaptiveThrottle::new(&config(20.0, 1.0, 99.0, 5.0, 1.0), 3);
        for _ in 0..30 {
            throttle.record_latency(0.5);
        }
        // Floor is max(min_spacing, worker_count) = 3, never the raw min.
        assert!((throttle.current_spacing() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn mid_zone_holds_spacing() {
        let throttle = AdaptiveThrottle::new(&config(10.0, 1.0, 99.0, 5.0, 1.0), 2);
        // Mean of 4.0 is below threshold but above threshold/2.
        for _ in 0..10 {
            throttle.record_latency(4.0);
        }
        assert!((throttle.current_spacing() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn spacing_stays_within_bounds() {
        let throttle = AdaptiveThrottle::new(&config(5.0, 2.0, 7.0, 5.0, 3.0), 2);
        for i in 0..50 {
            let latency = if i % 2 == 0 { 30.0 } else { 0.01 };
            throttle.record_latency(latency);
            let spacing = throttle.current_spacing();
            assert!((2.0..=7.0).contains(&spacing), "spacing {spacing} out of bounds");
        }
    }

    #[test]
    fn single_worker_disables_adaptation() {
        let throttle = AdaptiveThrottle::new(&config(5.0, 1.0, 99.0, 5.0, 1.0), 1);
        for _ in 0..10 {
            throttle.record_latency(30.0);
        }
        assert!((throttle.current_spacing() - 5.0).abs() < f64::EPSILON);
        assert!(!throttle.snapshot().adaptive_enabled);
    }

    #[test]
    fn disabled_flag_freezes_spacing() {
        let mut cfg = config(5.0, 1.0, 99.0, 5.0, 1.0);
        cfg.enable_adaptive_spacing = false;
        let throttle = AdaptiveThrottle::new(&cfg, 4);
        for _ in 0..10 {
            throttle.record_latency(30.0);
        }
        assert!((throttle.current_spacing() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn noise_samples_discarded() {
        let throttle = AdaptiveThrottle::new(&config(5.0, 1.0, 99.0, 5.0, 1.0), 2);
        for _ in 0..10 {
            throttle.record_latency(0.0001);
        }
        assert_eq!(throttle.snapshot().samples, 0);
    }

    #[test]
    fn fewer_than_three_samples_never_adjust() {
        let throttle = AdaptiveThrottle::new(&config(5.0, 1.0, 99.0, 5.0, 1.0), 2);
        throttle.record_latency(30.0);
        throttle.record_latency(30.0);
        assert!((throttle.current_spacing() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn wait_budget_zero_before_first_submission() {
        let throttle = AdaptiveThrottle::new(&config(5.0, 1.0, 99.0, 5.0, 1.0), 2);
        assert_eq!(throttle.wait_budget(), Duration::ZERO);
    }

    #[test]
    fn wait_budget_counts_down_after_submission() {
        let throttle = AdaptiveThrottle::new(&config(5.0, 1.0, 99.0, 5.0, 1.0), 2);
        throttle.register_submission();
        let budget = throttle.wait_budget();
        assert!(budget > Duration::from_secs(4));
        assert!(budget <= Duration::from_secs(5));
    }

    #[test]
    fn try_begin_is_atomic_gate() {
        let throttle = AdaptiveThrottle::new(&config(5.0, 1.0, 99.0, 5.0, 1.0), 2);
        assert!(throttle.try_begin_submission().is_none());
        // Second caller in the same slot must wait.
        let wait = throttle.try_begin_submission().expect("gate should be closed");
        assert!(wait > Duration::ZERO);
        assert_eq!(throttle.snapshot().submissions, 1);
    }

    #[test]
    fn adaptive_timeout_clamped() {
        let throttle = AdaptiveThrottle::new(&config(5.0, 1.0, 99.0, 5.0, 1.0), 2);
        let timeout = throttle.adaptive_timeout(
            Duration::from_secs(30),
            Duration::from_secs(60),
            Duration::from_secs(300),
        );
        // 5 + 30 = 35, below the floor of 60.
        assert_eq!(timeout, Duration::from_secs(60));

        let timeout = throttle.adaptive_timeout(
            Duration::from_secs(30),
            Duration::from_secs(10),
            Duration::from_secs(300),
        );
        assert_eq!(timeout, Duration::from_secs(35));
    }

    #[test]
    fn snapshot_reports_mean() {
        let throttle = AdaptiveThrottle::new(&config(5.0, 1.0, 99.0, 5.0, 1.0), 2);
        throttle.record_latency(2.0);
        throttle.record_latency(4.0);
        let snap = throttle.snapshot();
        assert_eq!(snap.samples, 2);
        assert!((snap.avg_response_time - 3.0).abs() < 1e-9);
    }

    #[test]
    fn window_is_bounded() {
        let throttle = AdaptiveThrottle::new(&config(5.0, 1.0, 99.0, 5.0, 1.0), 1);
        for _ in 0..25 {
            throttle.record_latency(1.0);
        }
        assert_eq!(throttle.snapshot().samples, 10);
    }
}
