use std::time::Instant;

use crate::adaptation::PressureLevel;
use crate::circuit_breaker::CircuitBreaker;
use crate::config::{ChunkerConfig, ForcedStrategy};
use crate::metrics::PerformanceMetrics;

/// The two execution strategies (spec.md glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Simple,
    Advanced,
}

/// Coarse system-health classification consumed by selection rule 3. Derived
/// from the constraint ladder's pressure level, since the spec's "Health
/// state" and the ladder's watermarks describe the same underlying signal
/// (spec.md §4.3/§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Warning,
    Critical,
}

impl HealthState {
    pub fn from_pressure(level: PressureLevel) -> Self {
        match level {
            PressureLevel::Normal => HealthState::Healthy,
            PressureLevel::Medium => HealthState::Warning,
            PressureLevel::High | PressureLevel::Critical => HealthState::Critical,
        }
    }
}

/// Heuristic content classification feeding the complexity estimate's content
/// factor (spec.md §4.8's "Complexity estimate").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Code,
    Json,
    Markdown,
    Other,
}

impl ContentType {
    pub fn detect(text: &str) -> Self {
        let trimmed = text.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            ContentType::Json
        } else if trimmed.starts_with('#') || trimmed.contains("\n## ") || trimmed.contains("\n# ") {
            ContentType::Markdown
        } else if trimmed.contains("fn ") || trimmed.contains("function ") || trimmed.contains("class ") || trimmed.contains("impl ") {
            ContentType::Code
        } else {
            ContentType::Other
        }
    }

    fn factor(self) -> f64 {
        match self {
            ContentType::Code => 1.3,
            ContentType::Json => 1.2,
            ContentType::Markdown => 1.1,
            ContentType::Other => 1.0,
        }
    }
}

/// Time a sample of the text through `fn`, extrapolate linearly, and scale by
/// content/size factors (spec.md §4.8). On any failure (the sampled `fn` call
/// panicking or erroring) returns `complexity_threshold`, degrading to
/// neutral.
pub fn estimate_complexity<F>(text: &str, sample_size: usize, complexity_threshold: f64, chunker_fn: &F) -> f64
where
    F: Fn(&str) -> Result<Vec<String>, String>,
{
    let len = text.len();
    if len == 0 {
        return complexity_threshold;
    }

    let sample_len = sample_size.min(len).max(1);
    let sample = &text[..char_boundary_at_or_before(text, sample_len)];

    let start = Instant::now();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| chunker_fn(sample)));
    let elapsed = start.elapsed().as_secs_f64();

    let ok = matches!(result, Ok(Ok(_)));
    if !ok {
        return complexity_threshold;
    }

    let sample_len = sample.len().max(1);
    let base_estimate = (elapsed / sample_len as f64) * len as f64;

    let content_factor = ContentType::detect(text).factor();
    let size_factor = (1.0 + 0.2 * (len as f64 / sample_len as f64).log2()).min(2.0);

    base_estimate * content_factor * size_factor
}

fn char_boundary_at_or_before(text: &str, idx: usize) -> usize {
    let mut idx = idx.min(text.len());
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Context the selection algorithm reasons over; bundled to keep
/// `select_strategy`'s signature from growing unboundedly as new rules are
/// added.
pub struct SelectionContext<'a> {
    pub config: &'a ChunkerConfig,
    pub circuit_breaker: &'a CircuitBreaker,
    pub metrics: &'a PerformanceMetrics,
    pub health: HealthState,
    pub mem_percent: f64,
}

/// Strategy selection, first-match-wins over the seven rules of spec.md
/// §4.8. `complexity` must already have been computed by
/// [`estimate_complexity`] (kept as a separate step since it has a real cost
/// and callers may want to skip it once an earlier rule already decided).
pub fn select_strategy(text: &str, ctx: &SelectionContext, complexity: f64) -> Strategy {
    if let Some(forced) = ctx.config.force_strategy {
        return match forced {
            ForcedStrategy::Simple => Strategy::Simple,
            ForcedStrategy::Advanced => Strategy::Advanced,
        };
    }

    if ctx.circuit_breaker.is_open() {
        tracing::info!("strategy selection: circuit breaker open, forcing simple");
        return Strategy::Simple;
    }

    if matches!(ctx.health, HealthState::Critical | HealthState::Warning) && ctx.config.memory_safety {
        return Strategy::Simple;
    }

    if text.len() < ctx.config.size_threshold {
        return Strategy::Simple;
    }

    if ctx.mem_percent > 0.80 && text.len() > 10 * ctx.config.size_threshold {
        return Strategy::Simple;
    }

    let error_rate = ctx.metrics.recent_error_rate_per_minute();
    if error_rate > 0.5 && ctx.metrics.last_strategy() == Some(Strategy::Advanced) {
        return Strategy::Simple;
    }

    if complexity < ctx.config.complexity_threshold {
        Strategy::Simple
    } else {
        Strategy::Advanced
    }
}
