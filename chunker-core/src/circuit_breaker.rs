use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::{info, warn};

/// Three-state guard in front of the advanced execution path (spec.md §4.5).
/// `is_open()` is lock-free-fast: it must never block strategy selection's hot
/// path, so state is a trio of atomics rather than a mutex-guarded struct,
/// following `streaming/worker_pool.rs`'s `CircuitBreakerState` but with the
/// reads split out for lock-freedom.
pub struct CircuitBreaker {
    state: AtomicU8State,
    failure_count: AtomicU32,
    reset_at_millis: AtomicU64,
    half_open_probe_in_flight: AtomicBool,
    epoch: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct AtomicU8State(std::sync::atomic::AtomicU8);

impl AtomicU8State {
    fn new(state: BreakerState) -> Self {
        Self(std::sync::atomic::AtomicU8::new(encode(state)))
    }

    fn load(&self) -> BreakerState {
        decode(self.0.load(Ordering::Acquire))
    }

    fn store(&self, state: BreakerState) {
        self.0.store(encode(state), Ordering::Release);
    }

    fn compare_exchange(&self, current: BreakerState, new: BreakerState) -> bool {
        self.0
            .compare_exchange(encode(current), encode(new), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

fn encode(state: BreakerState) -> u8 {
    match state {
        BreakerState::Closed => 0,
        BreakerState::Open => 1,
        BreakerState::HalfOpen => 2,
    }
}

fn decode(value: u8) -> BreakerState {
    match value {
        1 => BreakerState::Open,
        2 => BreakerState::HalfOpen,
        _ => BreakerState::Closed,
    }
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            state: AtomicU8State::new(BreakerState::Closed),
            failure_count: AtomicU32::new(0),
            reset_at_millis: AtomicU64::new(0),
            half_open_probe_in_flight: AtomicBool::new(false),
            epoch: Instant::now(),
        }
    }

    /// Lock-free read of whether the breaker currently forces the simple
    /// strategy. Performs the Open -> HalfOpen transition inline when the
    /// reset deadline has passed, per spec.md §4.5 ("HalfOpen on first read
    /// after now >= reset_at").
    pub fn is_open(&self) -> bool {
        match self.state.load() {
            BreakerState::Closed => false,
            BreakerState::HalfOpen => false,
            BreakerState::Open => {
                if self.now_millis() >= self.reset_at_millis.load(Ordering::Acquire) {
                    if self.state.compare_exchange(BreakerState::Open, BreakerState::HalfOpen) {
                        info!("circuit breaker: Open -> HalfOpen (reset deadline elapsed)");
                    }
                    false
                } else {
                    true
                }
            }
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state.load()
    }

    /// `HalfOpen` admits exactly one synthetic probe; callers use this to
    /// claim that single slot before running the health-check task.
    pub fn try_claim_half_open_probe(&self) -> bool {
        if self.state.load() != BreakerState::HalfOpen {
            return false;
        }
        self.half_open_probe_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn record_success(&self) {
        let was_half_open = self.state.load() == BreakerState::HalfOpen;
        self.failure_count.store(0, Ordering::Release);
        if was_half_open {
            self.half_open_probe_in_flight.store(false, Ordering::Release);
            if self.state.compare_exchange(BreakerState::HalfOpen, BreakerState::Closed) {
                info!("circuit breaker: HalfOpen -> Closed (probe succeeded)");
            }
        }
    }

    /// Record a failure. `ladder_critical` mirrors spec.md §4.5's second
    /// trip condition ("a constraint-ladder reading of 'critical' is
    /// observed"); `error_exceeds_success` is the chunker's running
    /// error_count > success_count comparison.
    pub fn record_failure(&self, error_exceeds_success: bool, ladder_critical: bool) {
        let was_half_open = self.state.load() == BreakerState::HalfOpen;
        if was_half_open {
            self.half_open_probe_in_flight.store(false, Ordering::Release);
            self.trip("HalfOpen -> Open (probe failed)");
            return;
        }

        let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
        if error_exceeds_success || ladder_critical {
            if self.state.load() == BreakerState::Closed {
                self.trip_with_failures("Closed -> Open", failures);
            }
        }
    }

    fn trip(&self, reason: &str) {
        let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
        self.trip_with_failures(reason, failures);
    }

    fn trip_with_failures(&self, reason: &str, failures: u32) {
        let backoff = backoff_seconds(failures);
        let reset_at = self.now_millis() + backoff * 1000;
        self.reset_at_millis.store(reset_at, Ordering::Release);
        self.state.store(BreakerState::Open);
        warn!(failures, backoff_secs = backoff, "circuit breaker: {reason}");
    }

    fn now_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

/// `min(60, 2^min(failure_count, 6))`, per spec.md §3/§4.5.
fn backoff_seconds(failure_count: u32) -> u64 {
    let exponent = failure_count.min(6);
    (1u64 << exponent).min(60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed() {
        let breaker = CircuitBreaker::new();
        assert!(!breaker.is_open());
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn trips_open_on_failure_with_error_exceeding_success() {
        let breaker = CircuitBreaker::new();
        breaker.record_failure(true, false);
        assert!(breaker.is_open());
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn trips_open_on_critical_ladder_reading_alone() {
        let breaker = CircuitBreaker::new();
        breaker.record_failure(false, true);
        assert!(breaker.is_open());
    }

    #[test]
    fn backoff_formula_matches_spec() {
        assert_eq!(backoff_seconds(0), 1);
        assert_eq!(backoff_seconds(1), 2);
        assert_eq!(backoff_seconds(6), 64.min(60));
        assert_eq!(backoff_seconds(10), 60);
    }

    #[test]
    fn half_open_admits_exactly_one_probe() {
        let breaker = CircuitBreaker::new();
        breaker.record_failure(true, false);
        // Force past the reset deadline by directly manipulating internal state
        // via the public is_open() transition path is time-dependent; instead
        // verify the single-admission invariant once in HalfOpen.
        breaker.state.store(BreakerState::HalfOpen);
        assert!(breaker.try_claim_half_open_probe());
        assert!(!breaker.try_claim_half_open_probe());
    }

    #[test]
    fn success_in_half_open_closes_breaker() {
        let breaker = CircuitBreaker::new();
        breaker.state.store(BreakerState::HalfOpen);
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
