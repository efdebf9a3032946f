use std::sync::Arc;

use crate::adaptation::TuningParameters;
use crate::chunker::pool;
use crate::metrics::PerformanceMetrics;
use crate::resource::ResourceProbe;
use crate::streaming_buffer::StreamingBuffer;

/// Memory-pressure jump, in percentage points between consecutive batches,
/// that triggers an adaptive batch-size halving mid-call (spec.md §4.8,
/// "Simple strategy").
const BATCH_SHRINK_MEM_DELTA: f64 = 0.10;

/// Segments `text` at natural boundaries and runs batches of `batch_size`
/// segments through `f`, bounded to `max_workers` concurrent blocking calls.
/// Samples memory after every batch and halves the remaining batch size
/// (locally, not persisted back to the shared tuning parameters) if memory
/// grew more than 10 points since the previous batch.
pub async fn run_simple<F>(
    text: &str,
    f: Arc<F>,
    params: &TuningParameters,
    probe: &ResourceProbe,
    metrics: &PerformanceMetrics,
) -> Result<Vec<String>, String>
where
    F: Fn(&str) -> Result<Vec<String>, String> + Send + Sync + 'static,
{
    let segments = StreamingBuffer::split(text, params.chunk_size_bytes);
    if segments.is_empty() {
        return Ok(Vec::new());
    }

    let mut batch_size = params.batch_size.max(1);
    let mut prev_mem: Option<f64> = None;
    let mut output = Vec::new();

    let mut idx = 0;
    while idx < segments.len() {
        let end = (idx + batch_size).min(segments.len());
        let batch = &segments[idx..end];
        metrics.record_batch_size(batch.len());

        let batch_results = pool::run_bounded(batch, &f, params.max_workers).await?;
        for chunks in batch_results {
            output.extend(chunks);
        }

        let mem = probe.snapshot().mem_percent;
        metrics.record_memory(mem);
        if let Some(prev) = prev_mem {
            if mem - prev > BATCH_SHRINK_MEM_DELTA {
                batch_size = (batch_size / 2).max(1);
                tracing::debug!(new_batch_size = batch_size, mem, "simple strategy: memory grew, shrinking batch");
            }
        }
        prev_mem = Some(mem);

        idx = end;
    }

    Ok(output)
}
