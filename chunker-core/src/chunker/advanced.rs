use std::sync::Arc;

use crate::adaptation::TuningParameters;
use crate::chunker::pool;
use crate::streaming_buffer::StreamingBuffer;

/// Submits every segment of `text` to the bounded worker pool at once, rather
/// than Simple's batch-by-batch submission, trading memory headroom for
/// throughput (spec.md §4.8, "Advanced strategy"). Callers are responsible
/// for falling back to Simple when this returns an error or an empty result
/// for non-empty input — that decision lives in `Chunker::execute`, not here,
/// since it depends on circuit-breaker bookkeeping this module has no access
/// to.
pub async fn run_advanced<F>(text: &str, f: Arc<F>, params: &TuningParameters) -> Result<Vec<String>, String>
where
    F: Fn(&str) -> Result<Vec<String>, String> + Send + Sync + 'static,
{
    let segments = StreamingBuffer::split(text, params.chunk_size_bytes);
    if segments.is_empty() {
        return Ok(Vec::new());
    }

    let batch_results = pool::run_bounded(&segments, &f, params.max_workers).await?;
    Ok(batch_results.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn splits_and_reassembles_through_identity_fn() {
        let text = "word ".repeat(5000);
        let params = TuningParameters {
            max_workers: 8,
            chunk_size_bytes: 1000,
            batch_size: 4,
            timeout_factor: 1.0,
        };
        let f = Arc::new((|s: &str| Ok(vec![s.to_string()])) as fn(&str) -> Result<Vec<String>, String>);

        let chunks = run_advanced(&text, f, &params).await.unwrap();
        assert_eq!(chunks.concat(), text);
    }

    #[tokio::test]
    async fn empty_text_yields_empty_output() {
        let params = TuningParameters::initial(4);
        let f = Arc::new((|s: &str| Ok(vec![s.to_string()])) as fn(&str) -> Result<Vec<String>, String>);
        let chunks = run_advanced("", f, &params).await.unwrap();
        assert!(chunks.is_empty());
    }
}
