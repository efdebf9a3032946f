pub mod adaptation;
pub mod chunker;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod resource;
pub mod runtime;
pub mod streaming_buffer;

pub use adaptation::{AdaptationManager, EnvironmentHints, PressureLevel, StrategyKind, TuningParameters};
pub use chunker::priority::{self, Priority, PriorityProfile};
pub use chunker::selection::Strategy;
pub use chunker::{ChunkStream, Chunker};
pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use config::{ChunkerConfig, ChunkerConfigBuilder, ForcedStrategy};
pub use error::{ChunkerError, ChunkerResult};
pub use health::HealthCheckResult;
pub use metrics::MetricsSnapshot;
pub use resource::{ResourceProbe, ResourceSnapshot};

use std::sync::Once;

static LOGGING_INIT: Once = Once::new();

/// Installs a `tracing` subscriber for the whole process, once. Idempotent —
/// a second call (or a caller who already set their own global subscriber)
/// is silently ignored, matching the teacher's `init_logging`'s tolerance of
/// `SetGlobalDefaultError`.
pub fn init_logging(level: Option<String>) {
    LOGGING_INIT.call_once(|| {
        let log_level = level.unwrap_or_else(|| "info".to_string());
        if tracing::subscriber::set_global_default(
            tracing_subscriber::FmtSubscriber::builder()
                .with_env_filter(tracing_subscriber::EnvFilter::new(format!("chunker_core={log_level}")))
                .finish(),
        )
        .is_err()
        {
            // A global subscriber is already installed; nothing to do.
        }
    });
}

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
