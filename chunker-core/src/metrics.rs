use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

use crate::chunker::selection::Strategy;

/// Fixed-capacity append-only ring buffer: pushing past capacity drops the
/// oldest entry. Grounded on the bounded-history style of
/// `streaming/chunk_batcher.rs`'s `recent_performance: VecDeque<...>`.
#[derive(Debug, Clone)]
struct RingBuffer<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    fn push(&mut self, item: T) {
        if self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    fn truncate_to_fraction(&mut self, keep_fraction: f64) {
        let keep = ((self.items.len() as f64) * keep_fraction).round() as usize;
        while self.items.len() > keep {
            self.items.pop_front();
        }
    }

    fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// `(bytes, elapsed, throughput)` sample feeding the linear-regression
/// throughput predictor (spec.md §3, §4.6).
#[derive(Debug, Clone, Copy)]
pub struct WorkloadSample {
    pub bytes: f64,
    pub elapsed_secs: f64,
    pub throughput: f64,
}

#[derive(Debug, Default)]
struct Counters {
    total_chunks: AtomicU64,
    total_bytes: AtomicU64,
    errors: AtomicU64,
    retries: AtomicU64,
    strategy_switches: AtomicU64,
    decisions_simple: AtomicU64,
    decisions_advanced: AtomicU64,
}

struct Buffers {
    processing_times: RingBuffer<f64>,
    throughputs: RingBuffer<f64>,
    batch_sizes: RingBuffer<usize>,
    memory_samples: RingBuffer<f64>,
    workload_history: RingBuffer<WorkloadSample>,
    avg_processing_time: Option<f64>,
    last_strategy: Option<Strategy>,
}

impl Buffers {
    fn new() -> Self {
        Self {
            processing_times: RingBuffer::new(100),
            throughputs: RingBuffer::new(20),
            batch_sizes: RingBuffer::new(50),
            memory_samples: RingBuffer::new(20),
            workload_history: RingBuffer::new(50),
            avg_processing_time: None,
            last_strategy: None,
        }
    }
}

/// Point-in-time copy of the metrics state, safe to hand to a caller (spec.md
/// §6's `get_metrics()`).
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_chunks: u64,
    pub total_bytes: u64,
    pub errors: u64,
    pub retries: u64,
    pub strategy_switches: u64,
    pub decisions_simple: u64,
    pub decisions_advanced: u64,
    pub avg_processing_time_secs: f64,
    pub sample_count: usize,
}

/// Mutex-guarded ring buffers plus lock-free hot counters, mirroring the split
/// in `streaming/atomic_metrics.rs` between atomics (hot path) and an
/// aggregated snapshot (cold path) — here the ring buffers themselves need the
/// mutex since pushes mutate shared history, not just a scalar.
pub struct PerformanceMetrics {
    counters: Counters,
    buffers: Mutex<Buffers>,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            counters: Counters::default(),
            buffers: Mutex::new(Buffers::new()),
        }
    }

    pub fn record_processing(&self, elapsed_secs: f64, bytes_in: u64, chunks_out: u64) {
        self.counters.total_chunks.fetch_add(chunks_out, Ordering::Relaxed);
        self.counters.total_bytes.fetch_add(bytes_in, Ordering::Relaxed);

        let throughput = if elapsed_secs > 0.0 {
            bytes_in as f64 / elapsed_secs
        } else {
            bytes_in as f64
        };

        metrics::counter!("chunker_bytes_processed_total").increment(bytes_in);
        metrics::counter!("chunker_chunks_processed_total").increment(chunks_out);

        let mut buffers = self.buffers.lock().expect("metrics mutex poisoned");
        buffers.avg_processing_time = Some(match buffers.avg_processing_time {
            Some(avg) => 0.9 * avg + 0.1 * elapsed_secs,
            None => elapsed_secs,
        });
        buffers.processing_times.push(elapsed_secs);
        buffers.throughputs.push(throughput);
        buffers.workload_history.push(WorkloadSample {
            bytes: bytes_in as f64,
            elapsed_secs,
            throughput,
        });
    }

    pub fn record_decision(&self, strategy: Strategy, previous: Option<Strategy>) {
        match strategy {
            Strategy::Simple => {
                self.counters.decisions_simple.fetch_add(1, Ordering::Relaxed);
            }
            Strategy::Advanced => {
                self.counters.decisions_advanced.fetch_add(1, Ordering::Relaxed);
            }
        }

        if previous.is_some_and(|prev| prev != strategy) {
            self.counters.strategy_switches.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("chunker_strategy_switches_total").increment(1);
        }

        let mut buffers = self.buffers.lock().expect("metrics mutex poisoned");
        buffers.last_strategy = Some(strategy);
    }

    pub fn record_error(&self) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("chunker_errors_total").increment(1);
    }

    pub fn record_retry(&self) {
        self.counters.retries.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("chunker_retries_total").increment(1);
    }

    pub fn record_batch_size(&self, n: usize) {
        let mut buffers = self.buffers.lock().expect("metrics mutex poisoned");
        buffers.batch_sizes.push(n);
    }

    pub fn record_memory(&self, pct: f64) {
        metrics::gauge!("chunker_memory_percent").set(pct);
        let mut buffers = self.buffers.lock().expect("metrics mutex poisoned");
        buffers.memory_samples.push(pct);
    }

    pub fn last_strategy(&self) -> Option<Strategy> {
        self.buffers.lock().expect("metrics mutex poisoned").last_strategy
    }

    /// Error rate in errors-per-minute over the recorded processing samples,
    /// used by strategy selection rule 6 (spec.md §4.8).
    pub fn recent_error_rate_per_minute(&self) -> f64 {
        let buffers = self.buffers.lock().expect("metrics mutex poisoned");
        let total_elapsed: f64 = buffers.processing_times.iter().sum();
        if total_elapsed <= 0.0 {
            return 0.0;
        }
        let errors = self.counters.errors.load(Ordering::Relaxed) as f64;
        errors / (total_elapsed / 60.0)
    }

    /// Throughput prediction for a workload of `bytes_len`: linear regression
    /// over `workload_history` when there are >= 3 samples, clamped to
    /// `[min*0.8, max*1.2]`; otherwise the arithmetic mean (spec.md §4.6).
    pub fn predict_throughput(&self, bytes_len: f64) -> f64 {
        let buffers = self.buffers.lock().expect("metrics mutex poisoned");
        let samples: Vec<WorkloadSample> = buffers.workload_history.iter().copied().collect();
        drop(buffers);

        if samples.len() < 3 {
            if samples.is_empty() {
                return 0.0;
            }
            return samples.iter().map(|s| s.throughput).sum::<f64>() / samples.len() as f64;
        }

        let n = samples.len() as f64;
        let mean_x = samples.iter().map(|s| s.bytes).sum::<f64>() / n;
        let mean_y = samples.iter().map(|s| s.throughput).sum::<f64>() / n;

        let mut num = 0.0;
        let mut den = 0.0;
        for s in &samples {
            num += (s.bytes - mean_x) * (s.throughput - mean_y);
            den += (s.bytes - mean_x).powi(2);
        }

        let predicted = if den.abs() < f64::EPSILON {
            mean_y
        } else {
            let slope = num / den;
            let intercept = mean_y - slope * mean_x;
            slope * bytes_len + intercept
        };

        let min_observed = samples.iter().map(|s| s.throughput).fold(f64::MAX, f64::min);
        let max_observed = samples.iter().map(|s| s.throughput).fold(f64::MIN, f64::max);

        predicted.clamp(min_observed * 0.8, max_observed * 1.2)
    }

    /// Truncate all ring buffers to `keep_fraction` of their contents, used by
    /// the constraint ladder's Critical tier (spec.md §4.3).
    pub fn truncate_history(&self, keep_fraction: f64) {
        let mut buffers = self.buffers.lock().expect("metrics mutex poisoned");
        buffers.processing_times.truncate_to_fraction(keep_fraction);
        buffers.throughputs.truncate_to_fraction(keep_fraction);
        buffers.batch_sizes.truncate_to_fraction(keep_fraction);
        buffers.memory_samples.truncate_to_fraction(keep_fraction);
        buffers.workload_history.truncate_to_fraction(keep_fraction);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let buffers = self.buffers.lock().expect("metrics mutex poisoned");
        MetricsSnapshot {
            total_chunks: self.counters.total_chunks.load(Ordering::Relaxed),
            total_bytes: self.counters.total_bytes.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
            strategy_switches: self.counters.strategy_switches.load(Ordering::Relaxed),
            decisions_simple: self.counters.decisions_simple.load(Ordering::Relaxed),
            decisions_advanced: self.counters.decisions_advanced.load(Ordering::Relaxed),
            avg_processing_time_secs: buffers.avg_processing_time.unwrap_or(0.0),
            sample_count: buffers.processing_times.len(),
        }
    }

    pub fn reset(&self) {
        self.counters.total_chunks.store(0, Ordering::Relaxed);
        self.counters.total_bytes.store(0, Ordering::Relaxed);
        self.counters.errors.store(0, Ordering::Relaxed);
        self.counters.retries.store(0, Ordering::Relaxed);
        self.counters.strategy_switches.store(0, Ordering::Relaxed);
        self.counters.decisions_simple.store(0, Ordering::Relaxed);
        self.counters.decisions_advanced.store(0, Ordering::Relaxed);
        *self.buffers.lock().expect("metrics mutex poisoned") = Buffers::new();
    }
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_drops_oldest_past_capacity() {
        let mut buf = RingBuffer::new(3);
        buf.push(1);
        buf.push(2);
        buf.push(3);
        buf.push(4);
        let items: Vec<_> = buf.iter().copied().collect();
        assert_eq!(items, vec![2, 3, 4]);
    }

    #[test]
    fn exponential_smoothing_seeds_with_first_sample() {
        let metrics = PerformanceMetrics::new();
        metrics.record_processing(2.0, 100, 1);
        assert_eq!(metrics.snapshot().avg_processing_time_secs, 2.0);
        metrics.record_processing(4.0, 100, 1);
        let expected = 0.9 * 2.0 + 0.1 * 4.0;
        assert!((metrics.snapshot().avg_processing_time_secs - expected).abs() < 1e-9);
    }

    #[test]
    fn predict_throughput_falls_back_to_mean_under_three_samples() {
        let metrics = PerformanceMetrics::new();
        metrics.record_processing(1.0, 100, 1);
        metrics.record_processing(1.0, 200, 1);
        let prediction = metrics.predict_throughput(500.0);
        assert!((prediction - 150.0).abs() < 1e-9);
    }

    #[test]
    fn predict_throughput_is_clamped_to_observed_bounds() {
        let metrics = PerformanceMetrics::new();
        metrics.record_processing(1.0, 100_000, 1);
        metrics.record_processing(2.0, 200_000, 1);
        metrics.record_processing(3.0, 300_000, 1);
        let prediction = metrics.predict_throughput(400_000.0);
        let min_observed = 100_000.0_f64.min(100_000.0).min(100_000.0);
        let _ = min_observed;
        assert!(prediction >= 100_000.0 * 0.8);
        assert!(prediction <= 100_000.0 * 1.2);
    }

    #[test]
    fn strategy_switch_counted_only_on_change() {
        let metrics = PerformanceMetrics::new();
        metrics.record_decision(Strategy::Simple, None);
        metrics.record_decision(Strategy::Simple, Some(Strategy::Simple));
        metrics.record_decision(Strategy::Advanced, Some(Strategy::Simple));
        assert_eq!(metrics.snapshot().strategy_switches, 1);
        assert_eq!(metrics.snapshot().decisions_simple, 2);
        assert_eq!(metrics.snapshot().decisions_advanced, 1);
    }
}
