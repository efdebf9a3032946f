use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Bounded concurrent executor shared by Simple and Advanced execution
/// (spec.md §4.8): at most `max_workers` blocking tasks run `f` over a
/// segment at once, results collected back in input order. Grounded on
/// `streaming/worker_pool.rs::StreamingWorkerPool`'s semaphore-bounded
/// submission, generalized from NAPI file-streaming to plain text segments.
/// Each submission gets a `Uuid` task id for tracing, mirroring the teacher's
/// `create_streaming_task`'s `Uuid::new_v4()` per-task identifiers.
pub async fn run_bounded<F>(
    segments: &[&str],
    f: &Arc<F>,
    max_workers: usize,
) -> Result<Vec<Vec<String>>, String>
where
    F: Fn(&str) -> Result<Vec<String>, String> + Send + Sync + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut handles = Vec::with_capacity(segments.len());

    for segment in segments {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|e| e.to_string())?;
        let f = Arc::clone(f);
        let owned = segment.to_string();
        let task_id = Uuid::new_v4();
        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            tracing::trace!(%task_id, bytes = owned.len(), "submitting segment to bounded pool");
            f(&owned)
        }));
    }

    // Join handles were spawned in input order above; awaiting them through
    // `join_all` in that same order (rather than as they complete) is what
    // keeps the collected output order-preserving.
    let joined = join_all(handles).await;
    let mut results = Vec::with_capacity(joined.len());
    for handle_result in joined {
        let chunks = handle_result.map_err(|e| e.to_string())??;
        results.push(chunks);
    }
    Ok(results)
}
