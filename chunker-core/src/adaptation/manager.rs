use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::info;

use crate::adaptation::constraint::{ConstraintAdapter, PressureLevel};
use crate::adaptation::params::TuningParameters;
use crate::adaptation::strategy::{self, StrategyKind};
use crate::circuit_breaker::CircuitBreaker;
use crate::metrics::PerformanceMetrics;
use crate::resource::ResourceProbe;

/// Environment facts auto-selection reasons about (spec.md §4.4). Passed in
/// explicitly rather than read from hidden global state, per spec.md §9's
/// "no hidden singletons on the hot path" design note and SPEC_FULL B.4.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentHints {
    pub is_container: bool,
    pub is_laptop: bool,
    pub is_cloud: bool,
    pub is_spot: bool,
}

/// Owns the single `TuningParameters` instance and runs the control loop.
/// Grounded on `original_source/backend/hyperion/adaptation.py::AdaptationManager`
/// (auto-select logic, 5s adaptation interval) and `runtime/shared_runtime.rs`'s
/// background-task-plus-handle pattern.
pub struct AdaptationManager {
    probe: Arc<ResourceProbe>,
    constraint_adapter: ConstraintAdapter,
    params: RwLock<Arc<TuningParameters>>,
    active_strategy: RwLock<StrategyKind>,
    last_tick: RwLock<Option<Instant>>,
    adaptation_interval: Duration,
}

impl AdaptationManager {
    pub fn new(probe: Arc<ResourceProbe>, adaptation_interval: Duration, logical_cores: usize) -> Self {
        Self {
            probe,
            constraint_adapter: ConstraintAdapter::new(),
            params: RwLock::new(Arc::new(TuningParameters::initial(logical_cores))),
            active_strategy: RwLock::new(StrategyKind::Balanced),
            last_tick: RwLock::new(None),
            adaptation_interval,
        }
    }

    /// Concurrent-safe read of the current tuning parameters.
    pub fn snapshot_params(&self) -> Arc<TuningParameters> {
        Arc::clone(&self.params.read().expect("params lock poisoned"))
    }

    pub fn set_strategy(&self, kind: StrategyKind) {
        *self.active_strategy.write().expect("strategy lock poisoned") = kind;
    }

    pub fn active_strategy(&self) -> StrategyKind {
        *self.active_strategy.read().expect("strategy lock poisoned")
    }

    /// `container -> container_aware`, `laptop + on_battery -> energy_efficient`,
    /// `cloud + spot -> conservative`, `cloud + non-spot -> aggressive`, else
    /// `balanced` (spec.md §4.4).
    pub fn auto_select_strategy(&self, hints: EnvironmentHints) -> StrategyKind {
        let on_battery = self.probe.snapshot().on_battery;

        let (kind, reason) = if hints.is_container {
            (StrategyKind::ContainerAware, "container environment detected")
        } else if hints.is_laptop && on_battery {
            (StrategyKind::EnergyEfficient, "laptop running on battery")
        } else if hints.is_cloud && hints.is_spot {
            (StrategyKind::Conservative, "cloud spot instance - preemption risk")
        } else if hints.is_cloud {
            (StrategyKind::Aggressive, "cloud on-demand instance")
        } else {
            (StrategyKind::Balanced, "no special environment detected")
        };

        info!(strategy = ?kind, reason, "auto-selected adaptation strategy");
        self.set_strategy(kind);
        kind
    }

    /// Run the control loop once: probe, constraint ladder, strategy, apply.
    /// No-op if called again within `adaptation_interval` of the last
    /// effective tick (spec.md §4.4).
    pub fn tick(&self, circuit_breaker: &CircuitBreaker, metrics: &PerformanceMetrics) {
        {
            let mut last_tick = self.last_tick.write().expect("last_tick lock poisoned");
            if let Some(last) = *last_tick {
                if last.elapsed() < self.adaptation_interval {
                    return;
                }
            }
            *last_tick = Some(Instant::now());
        }

        let snapshot = self.probe.snapshot();
        metrics.record_memory(snapshot.mem_percent);

        let current = *self.snapshot_params();
        let level = PressureLevel::classify(snapshot.mem_percent);

        if level == PressureLevel::Critical {
            circuit_breaker.record_failure(false, true);
        }

        let next = if let Some(ladder_result) = self.constraint_adapter.apply(level, current, metrics) {
            ladder_result
        } else {
            let kind = self.active_strategy();
            let mut applied = strategy::apply(kind, &snapshot, current);
            if kind == StrategyKind::ContainerAware {
                applied.max_workers = strategy::container_worker_cap(&snapshot, applied.max_workers);
            }
            applied
        };

        let next = next.clamp_to_bounds(snapshot.logical_cores);
        *self.params.write().expect("params lock poisoned") = Arc::new(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> AdaptationManager {
        AdaptationManager::new(Arc::new(ResourceProbe::new(Duration::from_secs(5))), Duration::from_millis(1), 4)
    }

    #[test]
    fn tick_is_throttled_within_interval() {
        let manager = AdaptationManager::new(Arc::new(ResourceProbe::new(Duration::from_secs(5))), Duration::from_secs(60), 4);
        let breaker = CircuitBreaker::new();
        let metrics = PerformanceMetrics::new();

        let before = manager.snapshot_params();
        manager.tick(&breaker, &metrics);
        let first = manager.snapshot_params();
        manager.tick(&breaker, &metrics);
        let second = manager.snapshot_params();

        assert!(Arc::ptr_eq(&first, &second));
        let _ = before;
    }

    #[test]
    fn auto_select_picks_container_aware() {
        let manager = manager();
        let kind = manager.auto_select_strategy(EnvironmentHints { is_container: true, ..Default::default() });
        assert_eq!(kind, StrategyKind::ContainerAware);
        assert_eq!(manager.active_strategy(), StrategyKind::ContainerAware);
    }

    #[test]
    fn auto_select_defaults_to_balanced() {
        let manager = manager();
        let kind = manager.auto_select_strategy(EnvironmentHints::default());
        assert_eq!(kind, StrategyKind::Balanced);
    }

    #[test]
    fn auto_select_picks_aggressive_for_cloud_on_demand() {
        let manager = manager();
        let kind = manager.auto_select_strategy(EnvironmentHints { is_cloud: true, is_spot: false, ..Default::default() });
        assert_eq!(kind, StrategyKind::Aggressive);
    }

    #[test]
    fn auto_select_picks_conservative_for_cloud_spot() {
        let manager = manager();
        let kind = manager.auto_select_strategy(EnvironmentHints { is_cloud: true, is_spot: true, ..Default::default() });
        assert_eq!(kind, StrategyKind::Conservative);
    }
}
