use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Result of one synthetic health-check run (SPEC_FULL B.5). Carries the
/// resource reading taken alongside the check so a caller doesn't need a
/// second probe to explain a failure.
#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    pub success: bool,
    pub duration: Duration,
    pub error: Option<String>,
    pub memory_percent: f64,
    pub cpu_percent: f64,
}

/// Size of the synthetic filler text run through the real Simple execution
/// path as a health probe. Grounded on
/// `original_source/backend/enterprise_chunker/orchestrator.py`'s
/// `_run_health_check_task`, which builds a ~2KB `"x " * 1000` filler and
/// chunks it through the live simple-chunker component with an identity
/// function — not a disconnected microbenchmark.
const SYNTHETIC_WORKLOAD_REPEATS: usize = 1000;

pub fn synthetic_workload() -> String {
    "x ".repeat(SYNTHETIC_WORKLOAD_REPEATS)
}

/// Identity pass-through used as the health check's `fn` argument, matching
/// the original's `lambda x: [x]`.
pub fn identity_segment(s: &str) -> Result<Vec<String>, String> {
    Ok(vec![s.to_string()])
}

/// Throttles health checks to at most once every `throttle` (orchestrator.py:
/// "don't run health check too frequently", 5s default). Owned by the
/// chunker instance, not a process-wide singleton.
pub struct HealthMonitor {
    last_check: Mutex<Option<Instant>>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self {
            last_check: Mutex::new(None),
        }
    }

    pub fn due(&self, throttle: Duration) -> bool {
        let last = self.last_check.lock().expect("health monitor mutex poisoned");
        match *last {
            Some(t) => t.elapsed() >= throttle,
            None => true,
        }
    }

    pub fn mark_checked(&self) {
        *self.last_check.lock().expect("health monitor mutex poisoned") = Some(Instant::now());
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}
