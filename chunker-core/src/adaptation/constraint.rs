use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::adaptation::params::TuningParameters;
use crate::metrics::PerformanceMetrics;

/// Four memory-pressure tiers, in ascending severity (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureLevel {
    Normal,
    Medium,
    High,
    Critical,
}

impl PressureLevel {
    pub fn classify(mem_percent: f64) -> Self {
        if mem_percent >= 0.95 {
            PressureLevel::Critical
        } else if mem_percent >= 0.85 {
            PressureLevel::High
        } else if mem_percent >= 0.70 {
            PressureLevel::Medium
        } else {
            PressureLevel::Normal
        }
    }

    /// High/Critical readings win over the normal strategy's suggestion
    /// (spec.md §4.3, last line).
    pub fn overrides_strategy(self) -> bool {
        matches!(self, PressureLevel::High | PressureLevel::Critical)
    }
}

#[derive(Debug, Default, Clone)]
pub struct ConstraintAdapterStats {
    pub gc_hints_requested: u64,
}

/// Ported from `original_source/backend/hyperion/adaptation.py::ConstraintAdaptation`.
/// Runs before the chosen strategy on every adaptation tick and can override
/// its output entirely under High/Critical pressure.
pub struct ConstraintAdapter {
    last_gc_hint_high: Mutex<Option<Instant>>,
    last_gc_hint_critical: Mutex<Option<Instant>>,
    gc_hints_requested: AtomicU64,
    trim_ratio: f64,
}

impl ConstraintAdapter {
    pub fn new() -> Self {
        Self::with_trim_ratio(0.20)
    }

    /// SPEC_FULL B.3: the historical-data trim ratio is a constructor knob for
    /// tests; production code should use `new()`, which preserves the spec's
    /// 20% default exactly.
    pub fn with_trim_ratio(trim_ratio: f64) -> Self {
        Self {
            last_gc_hint_high: Mutex::new(None),
            last_gc_hint_critical: Mutex::new(None),
            gc_hints_requested: AtomicU64::new(0),
            trim_ratio,
        }
    }

    /// Apply the ladder for the given pressure level. Returns `None` when the
    /// level is Normal (no ladder adjustment; the caller's chosen strategy
    /// applies unmodified).
    pub fn apply(
        &self,
        level: PressureLevel,
        current: TuningParameters,
        metrics: &PerformanceMetrics,
    ) -> Option<TuningParameters> {
        match level {
            PressureLevel::Normal => None,
            PressureLevel::Medium => Some(TuningParameters {
                max_workers: scale(current.max_workers, 0.8),
                chunk_size_bytes: scale(current.chunk_size_bytes, 0.7),
                batch_size: scale(current.batch_size, 0.7),
                timeout_factor: current.timeout_factor,
            }),
            PressureLevel::High => {
                self.request_gc_hint_high();
                Some(TuningParameters {
                    max_workers: scale(current.max_workers, 0.6),
                    chunk_size_bytes: scale(current.chunk_size_bytes, 0.5),
                    batch_size: scale(current.batch_size, 0.5),
                    timeout_factor: current.timeout_factor,
                })
            }
            PressureLevel::Critical => {
                self.request_gc_hint_critical();
                metrics.truncate_history(1.0 - self.trim_ratio);
                Some(TuningParameters {
                    max_workers: scale(current.max_workers, 0.4),
                    chunk_size_bytes: scale(current.chunk_size_bytes, 0.3),
                    batch_size: 1,
                    timeout_factor: current.timeout_factor,
                })
            }
        }
    }

    /// Young-generation GC hint, throttled to at most once per 60s (spec.md
    /// §4.3). Rust has no generational GC to invoke; per SPEC_FULL's Open
    /// Question decision this is a best-effort no-op that still honours the
    /// throttle and the observability counter.
    fn request_gc_hint_high(&self) {
        let mut last = self.last_gc_hint_high.lock().expect("gc hint mutex poisoned");
        if last.is_none_or(|t| t.elapsed() >= Duration::from_secs(60)) {
            *last = Some(Instant::now());
            self.gc_hints_requested.fetch_add(1, Ordering::Relaxed);
            warn!("constraint adapter: requesting young-generation GC hint (high memory pressure)");
        }
    }

    /// Full GC hint, throttled to at most once per 30s (spec.md §4.3).
    fn request_gc_hint_critical(&self) {
        let mut last = self.last_gc_hint_critical.lock().expect("gc hint mutex poisoned");
        if last.is_none_or(|t| t.elapsed() >= Duration::from_secs(30)) {
            *last = Some(Instant::now());
            self.gc_hints_requested.fetch_add(1, Ordering::Relaxed);
            warn!("constraint adapter: requesting full GC hint (critical memory pressure)");
        }
    }

    pub fn stats(&self) -> ConstraintAdapterStats {
        ConstraintAdapterStats {
            gc_hints_requested: self.gc_hints_requested.load(Ordering::Relaxed),
        }
    }
}

impl Default for ConstraintAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn scale(value: usize, factor: f64) -> usize {
    ((value as f64) * factor).round().max(0.0) as usize
}
