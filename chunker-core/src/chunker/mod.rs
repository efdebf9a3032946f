pub mod advanced;
pub mod pool;
pub mod priority;
pub mod selection;
pub mod simple;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use priority::{Priority, PriorityProfile};
use selection::{HealthState, SelectionContext, Strategy};

use crate::adaptation::{AdaptationManager, EnvironmentHints, PressureLevel, StrategyKind};
use crate::circuit_breaker::{BreakerState, CircuitBreaker};
use crate::config::ChunkerConfig;
use crate::error::{ChunkerError, ChunkerResult};
use crate::health::{self, HealthCheckResult, HealthMonitor};
use crate::metrics::{MetricsSnapshot, PerformanceMetrics};
use crate::resource::ResourceProbe;
use crate::runtime::{ShutdownHandle, ShutdownSignal};

/// How far `stream_chunks` reads ahead of what it has already emitted,
/// expressed as a multiple of the worker budget (SPEC_FULL §C, "lazy
/// sequence of input segments" - bounded lookahead keeps the call lazy
/// without serialising on a single in-flight segment).
const STREAM_LOOKAHEAD_MULTIPLIER: usize = 2;

/// Distinguishes a refusal to run (memory safety) from an actual execution
/// failure, so the caller can decide whether the emergency path is even
/// worth attempting.
enum ExecError {
    MemoryRefusal,
    Failure(String),
}

/// The adaptive parallel processing core (spec.md overview): chunks text
/// through a caller-supplied processing function, picking between a Simple
/// and an Advanced execution strategy and continuously adapting worker
/// count, chunk size and batch size to live resource pressure. Grounded on
/// `streaming/mod.rs::StreamingEngine`'s role as the single owned entry
/// point coordinating a worker pool, metrics and a runtime handle.
pub struct Chunker {
    config: ChunkerConfig,
    runtime: tokio::runtime::Runtime,
    probe: Arc<ResourceProbe>,
    adaptation: Arc<AdaptationManager>,
    circuit_breaker: Arc<CircuitBreaker>,
    metrics: Arc<PerformanceMetrics>,
    shutdown_handle: ShutdownHandle,
    shut_down: AtomicBool,
    call_successes: AtomicU64,
    call_errors: AtomicU64,
}

impl Chunker {
    /// Builds a new chunker with its own multi-thread Tokio runtime and
    /// spawns the adaptation-tick and circuit-breaker health-probe
    /// background loops. The runtime is instance-owned (spec.md §9's
    /// "no hidden singletons") and is torn down when the chunker is dropped.
    pub fn new(config: ChunkerConfig) -> ChunkerResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_time()
            .thread_name("chunker-worker")
            .build()
            .map_err(|e| ChunkerError::Probe(e.to_string()))?;

        let probe = Arc::new(ResourceProbe::new(config.probe_interval));
        let logical_cores = probe.snapshot().logical_cores;
        let adaptation = Arc::new(AdaptationManager::new(Arc::clone(&probe), config.adaptation_interval, logical_cores));
        let circuit_breaker = Arc::new(CircuitBreaker::new());
        let metrics = Arc::new(PerformanceMetrics::new());
        let (shutdown_handle, shutdown_signal) = ShutdownHandle::new();

        runtime.spawn(adaptation_loop(
            Arc::clone(&adaptation),
            Arc::clone(&circuit_breaker),
            Arc::clone(&metrics),
            config.resource_monitor_interval,
            shutdown_signal.clone(),
        ));

        if config.health_check_enabled {
            runtime.spawn(health_loop(
                Arc::clone(&circuit_breaker),
                Arc::clone(&probe),
                Arc::clone(&adaptation),
                Arc::clone(&metrics),
                config.worker_count_override,
                config.resource_monitor_interval,
                shutdown_signal,
            ));
        }

        Ok(Self {
            config,
            runtime,
            probe,
            adaptation,
            circuit_breaker,
            metrics,
            shutdown_handle,
            shut_down: AtomicBool::new(false),
            call_successes: AtomicU64::new(0),
            call_errors: AtomicU64::new(0),
        })
    }

    /// Lets an embedding application pick a starting strategy based on facts
    /// about its environment (spec.md §4.4). Safe to call any time; does not
    /// require `new()`-time knowledge of the environment.
    pub fn auto_select_strategy(&self, hints: EnvironmentHints) -> StrategyKind {
        self.adaptation.auto_select_strategy(hints)
    }

    pub fn set_strategy(&self, kind: StrategyKind) {
        self.adaptation.set_strategy(kind);
    }

    /// Chunk `text` through `f`, synchronously from the caller's point of
    /// view. Internally spawns bounded parallel work on the chunker's own
    /// runtime (spec.md §4.8). Empty input short-circuits to `Ok(vec![])`
    /// without touching the strategy machinery.
    pub fn chunk<F>(&self, text: &str, f: F) -> ChunkerResult<Vec<String>>
    where
        F: Fn(&str) -> Result<Vec<String>, String> + Send + Sync + 'static,
    {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let profile = self.effective_profile();
        let f = Arc::new(f);
        self.runtime.block_on(self.chunk_async(text, f, profile))
    }

    /// Runs `chunk` with `priority` active for the duration of the call,
    /// overriding the configured timeout/retries/batch multiplier
    /// (spec.md §4.8).
    pub fn chunk_with_priority<F>(&self, text: &str, f: F, priority: Priority) -> ChunkerResult<Vec<String>>
    where
        F: Fn(&str) -> Result<Vec<String>, String> + Send + Sync + 'static,
    {
        priority::with(priority, || self.chunk(text, f))
    }

    /// Lazily chunks a caller-provided sequence of already-split segments,
    /// returning an iterator that emits as soon as each segment (in input
    /// order) is ready. Each segment is tried directly through `f`; on
    /// failure it falls back to the Simple strategy for that segment alone
    /// (SPEC_FULL §C).
    pub fn stream_chunks<F, I>(&self, segments: I, f: F) -> ChunkStream
    where
        F: Fn(&str) -> Result<Vec<String>, String> + Send + Sync + 'static,
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        let (sender, receiver) = std::sync::mpsc::channel();
        let probe = Arc::clone(&self.probe);
        let adaptation = Arc::clone(&self.adaptation);
        let metrics = Arc::clone(&self.metrics);
        let worker_override = self.config.worker_count_override;
        let f = Arc::new(f);
        let iter = segments.into_iter();

        let driver = self
            .runtime
            .spawn(drive_stream(probe, adaptation, metrics, worker_override, iter, f, sender));

        ChunkStream { receiver, driver }
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    /// Idempotent: signals the background loops to stop and waits briefly
    /// for them to notice. Safe to call more than once or to skip entirely
    /// (the runtime shuts down with the chunker regardless).
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown_handle.signal();
    }

    /// When an explicit `priority::with(...)` scope is open, its table entry
    /// wins outright (spec.md §4.8). Otherwise the call uses `ChunkerConfig`'s
    /// own `timeout`/`max_retries` (spec.md §6) rather than any priority
    /// table entry — that's the distinction `current_scoped()` exists to
    /// draw: "no scope open" is not the same as "an explicit `Normal` scope
    /// is open", even though both resolve to the same numbers when the
    /// config is left at its defaults (300s/3 retries, matching `Normal`'s
    /// table entry exactly).
    fn effective_profile(&self) -> PriorityProfile {
        match priority::current_scoped() {
            Some(p) => p.profile(),
            None => PriorityProfile {
                timeout: self.config.timeout,
                max_retries: self.config.max_retries,
                batch_size_multiplier: 1.0,
            },
        }
    }

    fn effective_params(&self, profile: &PriorityProfile) -> crate::adaptation::TuningParameters {
        let mut params = *self.adaptation.snapshot_params();
        if let Some(workers) = self.config.worker_count_override {
            params.max_workers = workers;
        }
        if self.config.adaptive_batch_sizing {
            params.batch_size = ((params.batch_size as f64) * profile.batch_size_multiplier).round().max(1.0) as usize;
        }
        params
    }

    fn truncate_for_emergency<'a>(&self, text: &'a str) -> &'a str {
        let limit = self.config.size_threshold.min(text.len());
        let mut idx = limit;
        while idx > 0 && !text.is_char_boundary(idx) {
            idx -= 1;
        }
        &text[..idx]
    }

    async fn chunk_async<F>(&self, text: &str, f: Arc<F>, profile: PriorityProfile) -> ChunkerResult<Vec<String>>
    where
        F: Fn(&str) -> Result<Vec<String>, String> + Send + Sync + 'static,
    {
        let params = self.effective_params(&profile);
        let deadline = Duration::from_secs_f64(profile.timeout.as_secs_f64() * params.timeout_factor);
        let start = Instant::now();

        let result = match tokio::time::timeout(deadline, self.execute(text, Arc::clone(&f), &params, &profile)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(elapsed_ms = start.elapsed().as_millis() as u64, "chunk call exceeded deadline, attempting emergency path");
                self.metrics.record_error();
                let truncated = self.truncate_for_emergency(text);
                match self.run_emergency(truncated, Arc::clone(&f), &params).await {
                    Ok(chunks) if !chunks.is_empty() => Ok(chunks),
                    _ => Err(ChunkerError::Timeout {
                        elapsed_ms: start.elapsed().as_millis() as u64,
                        limit_ms: deadline.as_millis() as u64,
                        truncated: true,
                    }),
                }
            }
        };

        self.record_call_outcome(&result);
        result
    }

    /// Feeds the chunker's own running error/success comparison into the
    /// circuit breaker, per `CircuitBreaker::record_failure`'s
    /// `error_exceeds_success` parameter.
    fn record_call_outcome(&self, result: &ChunkerResult<Vec<String>>) {
        match result {
            Ok(_) => {
                self.call_successes.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                let errors = self.call_errors.fetch_add(1, Ordering::Relaxed) + 1;
                let successes = self.call_successes.load(Ordering::Relaxed);
                let level = PressureLevel::classify(self.probe.snapshot().mem_percent);
                self.circuit_breaker
                    .record_failure(errors > successes, level == PressureLevel::Critical);
            }
        }
    }

    async fn execute<F>(
        &self,
        text: &str,
        f: Arc<F>,
        params: &crate::adaptation::TuningParameters,
        profile: &PriorityProfile,
    ) -> ChunkerResult<Vec<String>>
    where
        F: Fn(&str) -> Result<Vec<String>, String> + Send + Sync + 'static,
    {
        let snapshot = self.probe.snapshot();
        let level = PressureLevel::classify(snapshot.mem_percent);
        let health = HealthState::from_pressure(level);

        let complexity = {
            let f = Arc::clone(&f);
            selection::estimate_complexity(text, COMPLEXITY_SAMPLE_BYTES, self.config.complexity_threshold, &move |s: &str| f(s))
        };

        let ctx = SelectionContext {
            config: &self.config,
            circuit_breaker: &self.circuit_breaker,
            metrics: &self.metrics,
            health,
            mem_percent: snapshot.mem_percent,
        };
        let strategy = selection::select_strategy(text, &ctx, complexity);
        let previous = self.metrics.last_strategy();
        self.metrics.record_decision(strategy, previous);

        let process_start = Instant::now();

        let outcome = match strategy {
            Strategy::Simple => self.run_simple_guarded(text, Arc::clone(&f), params, level).await,
            Strategy::Advanced => match advanced::run_advanced(text, Arc::clone(&f), params).await {
                Ok(chunks) if !chunks.is_empty() => Ok(chunks),
                Ok(_) => {
                    tracing::info!("advanced strategy returned no output for non-empty input, falling back to simple");
                    self.metrics.record_retry();
                    self.retry_simple(text, Arc::clone(&f), params, level, profile.max_retries).await
                }
                Err(advanced_cause) => {
                    self.metrics.record_retry();
                    match self.retry_simple(text, Arc::clone(&f), params, level, profile.max_retries).await {
                        Ok(chunks) => Ok(chunks),
                        Err(ExecError::Failure(_)) => Err(ExecError::Failure(advanced_cause)),
                        Err(refusal) => Err(refusal),
                    }
                }
            },
        };

        match outcome {
            Ok(chunks) => {
                self.metrics.record_processing(process_start.elapsed().as_secs_f64(), text.len() as u64, chunks.len() as u64);
                Ok(chunks)
            }
            Err(ExecError::MemoryRefusal) => {
                let truncated = self.truncate_for_emergency(text);
                match self.run_emergency(truncated, f, params).await {
                    Ok(chunks) if !chunks.is_empty() => Ok(chunks),
                    _ => Err(ChunkerError::MemorySafety),
                }
            }
            Err(ExecError::Failure(cause)) => {
                self.metrics.record_error();
                Err(ChunkerError::StrategyFailure { cause })
            }
        }
    }

    /// One Simple execution attempt, refusing up front if memory_safety is
    /// enabled and pressure is Critical (spec.md §4.3/§4.8).
    async fn run_simple_guarded<F>(
        &self,
        text: &str,
        f: Arc<F>,
        params: &crate::adaptation::TuningParameters,
        level: PressureLevel,
    ) -> Result<Vec<String>, ExecError>
    where
        F: Fn(&str) -> Result<Vec<String>, String> + Send + Sync + 'static,
    {
        if self.config.memory_safety && level == PressureLevel::Critical {
            return Err(ExecError::MemoryRefusal);
        }
        simple::run_simple(text, f, params, &self.probe, &self.metrics)
            .await
            .map_err(ExecError::Failure)
    }

    /// Re-runs Simple up to `max_attempts` times, used as Advanced's fallback
    /// on error or empty output (spec.md §4.8, "Retry and emergency
    /// fallback"). The priority table's retry count governs the attempt
    /// budget here.
    async fn retry_simple<F>(
        &self,
        text: &str,
        f: Arc<F>,
        params: &crate::adaptation::TuningParameters,
        level: PressureLevel,
        max_attempts: u32,
    ) -> Result<Vec<String>, ExecError>
    where
        F: Fn(&str) -> Result<Vec<String>, String> + Send + Sync + 'static,
    {
        let mut last_err = ExecError::Failure("simple retry budget was zero".to_string());
        for attempt in 0..max_attempts.max(1) {
            if attempt > 0 {
                self.metrics.record_retry();
            }
            match self.run_simple_guarded(text, Arc::clone(&f), params, level).await {
                Ok(chunks) => return Ok(chunks),
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    /// Conservative-split fallback used when the deadline is exceeded or
    /// both strategies refuse/fail (spec.md §4.7's conservative splitter,
    /// capped at `min(size_threshold/4, 25_000)` bytes).
    async fn run_emergency<F>(&self, text: &str, f: Arc<F>, params: &crate::adaptation::TuningParameters) -> Result<Vec<String>, String>
    where
        F: Fn(&str) -> Result<Vec<String>, String> + Send + Sync + 'static,
    {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let segments = crate::streaming_buffer::StreamingBuffer::split_conservative(text, self.config.size_threshold);
        if segments.is_empty() {
            return Ok(Vec::new());
        }
        let max_workers = params.max_workers.max(1);
        let batch_results = pool::run_bounded(&segments, &f, max_workers).await?;
        Ok(batch_results.into_iter().flatten().collect())
    }
}

impl Drop for Chunker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Bytes of `text` sampled for the complexity estimate before extrapolating
/// (SPEC_FULL B, resolved from `original_source`'s `sample_size: int = 1000`).
const COMPLEXITY_SAMPLE_BYTES: usize = 1000;

/// Iterator returned by `Chunker::stream_chunks`. Aborts its background
/// driver task on drop so an abandoned stream doesn't keep running.
pub struct ChunkStream {
    receiver: std::sync::mpsc::Receiver<String>,
    driver: tokio::task::JoinHandle<()>,
}

impl Iterator for ChunkStream {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.receiver.recv().ok()
    }
}

impl Drop for ChunkStream {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

async fn drive_stream<F, I>(
    probe: Arc<ResourceProbe>,
    adaptation: Arc<AdaptationManager>,
    metrics: Arc<PerformanceMetrics>,
    worker_override: Option<usize>,
    mut segments: I,
    f: Arc<F>,
    sender: std::sync::mpsc::Sender<String>,
) where
    I: Iterator<Item = String> + Send,
    F: Fn(&str) -> Result<Vec<String>, String> + Send + Sync + 'static,
{
    let mut params = *adaptation.snapshot_params();
    if let Some(workers) = worker_override {
        params.max_workers = workers;
    }
    let max_workers = params.max_workers.max(1);
    let window = max_workers * STREAM_LOOKAHEAD_MULTIPLIER;
    let semaphore = Arc::new(tokio::sync::Semaphore::new(max_workers));

    let mut in_flight: std::collections::VecDeque<tokio::task::JoinHandle<Result<Vec<String>, String>>> = std::collections::VecDeque::new();
    let mut exhausted = false;

    for _ in 0..window.max(1) {
        match segments.next() {
            Some(segment) => in_flight.push_back(spawn_segment_task(
                segment,
                Arc::clone(&f),
                Arc::clone(&semaphore),
                Arc::clone(&probe),
                Arc::clone(&metrics),
                params,
            )),
            None => {
                exhausted = true;
                break;
            }
        }
    }

    while let Some(handle) = in_flight.pop_front() {
        let result = handle.await.unwrap_or_else(|e| Err(e.to_string()));
        match result {
            Ok(chunks) => {
                for chunk in chunks {
                    if sender.send(chunk).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "stream_chunks: segment failed after simple fallback, dropping segment");
            }
        }

        if !exhausted {
            match segments.next() {
                Some(segment) => in_flight.push_back(spawn_segment_task(
                    segment,
                    Arc::clone(&f),
                    Arc::clone(&semaphore),
                    Arc::clone(&probe),
                    Arc::clone(&metrics),
                    params,
                )),
                None => exhausted = true,
            }
        }
    }
}

fn spawn_segment_task<F>(
    segment: String,
    f: Arc<F>,
    semaphore: Arc<tokio::sync::Semaphore>,
    probe: Arc<ResourceProbe>,
    metrics: Arc<PerformanceMetrics>,
    params: crate::adaptation::TuningParameters,
) -> tokio::task::JoinHandle<Result<Vec<String>, String>>
where
    F: Fn(&str) -> Result<Vec<String>, String> + Send + Sync + 'static,
{
    tokio::task::spawn(async move {
        let permit = semaphore.acquire_owned().await.map_err(|e| e.to_string())?;
        let f_direct = Arc::clone(&f);
        let seg_direct = segment.clone();
        let direct = tokio::task::spawn_blocking(move || f_direct(&seg_direct))
            .await
            .map_err(|e| e.to_string())?;
        drop(permit);

        match direct {
            Ok(chunks) => Ok(chunks),
            Err(e) => {
                tracing::warn!(error = %e, "stream_chunks: segment failed, falling back to simple");
                metrics.record_retry();
                simple::run_simple(&segment, f, &params, &probe, &metrics).await
            }
        }
    })
}

async fn adaptation_loop(
    adaptation: Arc<AdaptationManager>,
    circuit_breaker: Arc<CircuitBreaker>,
    metrics: Arc<PerformanceMetrics>,
    interval: Duration,
    mut shutdown: ShutdownSignal,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                adaptation.tick(&circuit_breaker, &metrics);
            }
            _ = shutdown.wait() => break,
        }
        if shutdown.is_shutdown() {
            break;
        }
    }
}

const HEALTH_CHECK_THROTTLE: Duration = Duration::from_secs(5);
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Drains the circuit breaker's single HalfOpen probe slot by running the
/// synthetic workload through the real Simple path (spec.md §4.5, health.rs).
async fn health_loop(
    circuit_breaker: Arc<CircuitBreaker>,
    probe: Arc<ResourceProbe>,
    adaptation: Arc<AdaptationManager>,
    metrics: Arc<PerformanceMetrics>,
    worker_override: Option<usize>,
    interval: Duration,
    mut shutdown: ShutdownSignal,
) {
    let monitor = HealthMonitor::new();
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.wait() => break,
        }
        if shutdown.is_shutdown() {
            break;
        }

        if !monitor.due(HEALTH_CHECK_THROTTLE) {
            continue;
        }
        if circuit_breaker.state() != BreakerState::HalfOpen {
            continue;
        }
        if !circuit_breaker.try_claim_half_open_probe() {
            continue;
        }
        monitor.mark_checked();

        let result = run_health_check(&probe, &adaptation, &metrics, worker_override).await;
        if result.success {
            tracing::info!(duration_ms = result.duration.as_millis() as u64, "circuit breaker health check passed, closing");
            circuit_breaker.record_success();
        } else {
            tracing::warn!(error = ?result.error, "circuit breaker health check failed, keeping open");
            circuit_breaker.record_failure(true, false);
        }
    }
}

async fn run_health_check(
    probe: &ResourceProbe,
    adaptation: &AdaptationManager,
    metrics: &PerformanceMetrics,
    worker_override: Option<usize>,
) -> HealthCheckResult {
    let snapshot = probe.snapshot();
    let mut params = *adaptation.snapshot_params();
    if let Some(workers) = worker_override {
        params.max_workers = workers;
    }

    let text = health::synthetic_workload();
    let identity = Arc::new(health::identity_segment as fn(&str) -> Result<Vec<String>, String>);

    let start = Instant::now();
    let outcome = tokio::time::timeout(HEALTH_CHECK_TIMEOUT, simple::run_simple(&text, identity, &params, probe, metrics)).await;
    let duration = start.elapsed();

    match outcome {
        Ok(Ok(chunks)) if !chunks.is_empty() => HealthCheckResult {
            success: true,
            duration,
            error: None,
            memory_percent: snapshot.mem_percent,
            cpu_percent: snapshot.cpu_percent,
        },
        Ok(Ok(_)) => HealthCheckResult {
            success: false,
            duration,
            error: Some("empty result from health check".to_string()),
            memory_percent: snapshot.mem_percent,
            cpu_percent: snapshot.cpu_percent,
        },
        Ok(Err(e)) => HealthCheckResult {
            success: false,
            duration,
            error: Some(e),
            memory_percent: snapshot.mem_percent,
            cpu_percent: snapshot.cpu_percent,
        },
        Err(_) => HealthCheckResult {
            success: false,
            duration,
            error: Some("health check timed out".to_string()),
            memory_percent: snapshot.mem_percent,
            cpu_percent: snapshot.cpu_percent,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ChunkerConfig {
        ChunkerConfig {
            health_check_enabled: false,
            ..ChunkerConfig::default()
        }
    }

    #[test]
    fn empty_input_short_circuits() {
        let chunker = Chunker::new(test_config()).unwrap();
        let result = chunker.chunk("", |s| Ok(vec![s.to_string()])).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn small_input_round_trips() {
        let chunker = Chunker::new(test_config()).unwrap();
        let text = "hello world";
        let result = chunker.chunk(text, |s| Ok(vec![s.to_string()])).unwrap();
        assert_eq!(result.concat(), text);
    }

    #[test]
    fn large_input_round_trips_through_either_strategy() {
        let mut config = test_config();
        config.size_threshold = 1_000;
        let chunker = Chunker::new(config).unwrap();
        let text = "word ".repeat(10_000);
        let result = chunker.chunk(&text, |s| Ok(vec![s.to_string()])).unwrap();
        assert_eq!(result.concat(), text);
    }

    #[test]
    fn forced_simple_strategy_is_honoured() {
        let mut config = test_config();
        config.force_strategy = Some(crate::config::ForcedStrategy::Simple);
        let chunker = Chunker::new(config).unwrap();
        let text = "word ".repeat(10_000);
        let result = chunker.chunk(&text, |s| Ok(vec![s.to_string()])).unwrap();
        assert_eq!(result.concat(), text);
        assert_eq!(chunker.get_metrics().decisions_simple, 1);
    }

    #[test]
    fn priority_scope_is_honoured_without_panicking() {
        let chunker = Chunker::new(test_config()).unwrap();
        let result = chunker.chunk_with_priority("hello", |s| Ok(vec![s.to_string()]), Priority::High).unwrap();
        assert_eq!(result.concat(), "hello");
    }

    #[test]
    fn stream_chunks_preserves_order() {
        let chunker = Chunker::new(test_config()).unwrap();
        let segments = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let stream = chunker.stream_chunks(segments, |s| Ok(vec![s.to_string()]));
        let collected: Vec<String> = stream.collect();
        assert_eq!(collected, vec!["a", "b", "c"]);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let chunker = Chunker::new(test_config()).unwrap();
        chunker.shutdown();
        chunker.shutdown();
    }

    #[test]
    fn repeated_failures_eventually_force_simple_via_circuit_breaker() {
        let mut config = test_config();
        config.force_strategy = Some(crate::config::ForcedStrategy::Advanced);
        let chunker = Chunker::new(config).unwrap();
        let text = "word ".repeat(10_000);

        let _ = chunker.chunk(&text, |_s| Err("boom".to_string()));
        assert!(chunker.circuit_breaker.is_open() || chunker.circuit_breaker.state() == BreakerState::Open);
    }
}
