use thiserror::Error;

/// Error surface for the chunker, per the error-kind taxonomy: `EmptyInput` and
/// `CircuitOpen` are not variants here because neither is ever surfaced to a
/// caller (empty input returns `Ok(vec![])`; an open circuit forces simple
/// silently).
#[derive(Debug, Error)]
pub enum ChunkerError {
    #[error("call timed out after {elapsed_ms}ms (limit {limit_ms}ms); emergency path truncated={truncated}")]
    Timeout {
        elapsed_ms: u64,
        limit_ms: u64,
        truncated: bool,
    },

    #[error("memory pressure is critical and memory_safety is enabled; both simple and emergency paths refused to run")]
    MemorySafety,

    #[error("advanced strategy failed and the simple-strategy retry also failed: {cause}")]
    StrategyFailure { cause: String },

    #[error("resource probe I/O error: {0}")]
    Probe(String),

    #[error("health check probe failed: {0}")]
    HealthCheck(String),
}

pub type ChunkerResult<T> = Result<T, ChunkerError>;
