use crate::adaptation::params::TuningParameters;
use crate::resource::ResourceSnapshot;

/// Tagged enum of adaptation policies, replacing the source's subclassed
/// `adapt()` method hierarchy (`original_source/backend/hyperion/adaptation.py`)
/// with a single dispatch function, per spec.md §9's redesign note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Conservative,
    Balanced,
    Aggressive,
    EnergyEfficient,
    ContainerAware,
}

/// A multiplicative/additive adjustment applied to one parameter. `Mul`
/// multiplies the current value; `AddInt` adds an integer delta; `SetTo` pins
/// an absolute value (used by energy-efficient's "workers=1" cell).
#[derive(Debug, Clone, Copy)]
enum Adjust {
    Mul(f64),
    AddInt(i64),
    SetTo(usize),
    None,
}

fn apply_adjust(current: usize, adjust: Adjust) -> usize {
    match adjust {
        Adjust::Mul(factor) => ((current as f64) * factor).round().max(0.0) as usize,
        Adjust::AddInt(delta) => (current as i64 + delta).max(0) as usize,
        Adjust::SetTo(value) => value,
        Adjust::None => current,
    }
}

struct Deltas {
    workers: Adjust,
    chunk: Adjust,
    batch: Adjust,
}

const NO_CHANGE: Deltas = Deltas {
    workers: Adjust::None,
    chunk: Adjust::None,
    batch: Adjust::None,
};

/// Pure function `(snapshot, current) -> next`, applying per-call bounds
/// (workers +/-2, chunk x[0.3,1.3], batch +/-2) and the universal floors/cap
/// from spec.md §4.2 rules 1-3.
pub fn apply(kind: StrategyKind, snapshot: &ResourceSnapshot, current: TuningParameters) -> TuningParameters {
    let deltas = match kind {
        StrategyKind::Conservative => conservative_deltas(snapshot),
        StrategyKind::Balanced => balanced_deltas(snapshot.mem_percent, snapshot.cpu_percent),
        StrategyKind::Aggressive => aggressive_deltas(snapshot.mem_percent, snapshot.cpu_percent),
        StrategyKind::EnergyEfficient => energy_efficient_deltas(snapshot),
        StrategyKind::ContainerAware => container_aware_deltas(snapshot),
    };

    let next = TuningParameters {
        max_workers: bound_worker_step(current.max_workers, apply_adjust(current.max_workers, deltas.workers)),
        chunk_size_bytes: bound_chunk_step(current.chunk_size_bytes, apply_adjust(current.chunk_size_bytes, deltas.chunk)),
        batch_size: bound_batch_step(current.batch_size, apply_adjust(current.batch_size, deltas.batch)),
        timeout_factor: current.timeout_factor,
    };

    next.clamp_to_bounds(snapshot.logical_cores)
}

fn bound_worker_step(before: usize, after: usize) -> usize {
    let before = before as i64;
    let after = after as i64;
    before.saturating_add((after - before).clamp(-2, 2)).max(0) as usize
}

fn bound_chunk_step(before: usize, after: usize) -> usize {
    let min = (before as f64 * 0.3).round() as usize;
    let max = (before as f64 * 1.3).round() as usize;
    after.clamp(min.min(max), max.max(min))
}

fn bound_batch_step(before: usize, after: usize) -> usize {
    let before = before as i64;
    let after = after as i64;
    before.saturating_add((after - before).clamp(-2, 2)).max(0) as usize
}

fn conservative_deltas(snapshot: &ResourceSnapshot) -> Deltas {
    let mem = snapshot.mem_percent;
    let cpu = snapshot.cpu_percent;
    if mem > 0.85 || cpu > 0.9 {
        Deltas { workers: Adjust::Mul(0.8), chunk: Adjust::Mul(0.7), batch: Adjust::Mul(0.7) }
    } else if mem > 0.75 || cpu > 0.8 {
        Deltas { workers: Adjust::Mul(0.9), chunk: Adjust::Mul(0.8), batch: Adjust::Mul(0.8) }
    } else if mem < 0.3 && cpu < 0.3 {
        Deltas { workers: Adjust::AddInt(1), chunk: Adjust::Mul(1.1), batch: Adjust::AddInt(1) }
    } else {
        NO_CHANGE
    }
}

fn balanced_deltas(mem: f64, cpu: f64) -> Deltas {
    if mem > 0.9 || cpu > 0.95 {
        Deltas { workers: Adjust::Mul(0.7), chunk: Adjust::Mul(0.6), batch: Adjust::Mul(0.6) }
    } else if mem > 0.8 || cpu > 0.85 {
        Deltas { workers: Adjust::Mul(0.8), chunk: Adjust::Mul(0.8), batch: Adjust::Mul(0.8) }
    } else if mem < 0.4 && cpu < 0.4 {
        Deltas { workers: Adjust::AddInt(1), chunk: Adjust::Mul(1.2), batch: Adjust::AddInt(1) }
    } else if mem < 0.6 && cpu < 0.6 {
        Deltas { workers: Adjust::AddInt(1), chunk: Adjust::Mul(1.1), batch: Adjust::AddInt(1) }
    } else {
        NO_CHANGE
    }
}

fn aggressive_deltas(mem: f64, cpu: f64) -> Deltas {
    if mem > 0.9 || cpu > 0.95 {
        Deltas { workers: Adjust::Mul(0.6), chunk: Adjust::Mul(0.5), batch: Adjust::Mul(0.5) }
    } else if mem > 0.8 || cpu > 0.85 {
        Deltas { workers: Adjust::Mul(0.7), chunk: Adjust::Mul(0.7), batch: Adjust::Mul(0.7) }
    } else if mem > 0.7 || cpu > 0.75 {
        Deltas { workers: Adjust::Mul(0.9), chunk: Adjust::Mul(0.9), batch: Adjust::Mul(0.9) }
    } else if mem < 0.4 && cpu < 0.4 {
        Deltas { workers: Adjust::AddInt(2), chunk: Adjust::Mul(1.3), batch: Adjust::AddInt(2) }
    } else if mem < 0.6 && cpu < 0.6 {
        Deltas { workers: Adjust::AddInt(1), chunk: Adjust::Mul(1.15), batch: Adjust::AddInt(1) }
    } else {
        NO_CHANGE
    }
}

fn energy_efficient_deltas(snapshot: &ResourceSnapshot) -> Deltas {
    if snapshot.on_battery && snapshot.battery_percent < 0.15 {
        Deltas { workers: Adjust::SetTo(1), chunk: Adjust::Mul(0.3), batch: Adjust::SetTo(1) }
    } else {
        NO_CHANGE
    }
}

fn container_aware_deltas(snapshot: &ResourceSnapshot) -> Deltas {
    balanced_deltas(snapshot.container_mem_used_percent, snapshot.cpu_percent)
}

/// Additional container-aware cap applied after the balanced-shaped delta:
/// workers never exceed `0.8 * container_cpu_limit` when a limit is set.
pub fn container_worker_cap(snapshot: &ResourceSnapshot, workers: usize) -> usize {
    match snapshot.container_cpu_limit {
        Some(limit) if limit > 0.0 => {
            let cap = (0.8 * limit).floor().max(1.0) as usize;
            workers.min(cap)
        }
        _ => workers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(mem: f64, cpu: f64) -> ResourceSnapshot {
        ResourceSnapshot {
            mem_percent: mem,
            cpu_percent: cpu,
            logical_cores: 8,
            ..ResourceSnapshot::default()
        }
    }

    #[test]
    fn conservative_critical_reduces_all_three() {
        let current = TuningParameters { max_workers: 10, chunk_size_bytes: 100_000, batch_size: 10, timeout_factor: 1.0 };
        let next = apply(StrategyKind::Conservative, &snapshot(0.9, 0.5), current);
        assert!(next.max_workers < current.max_workers);
        assert!(next.chunk_size_bytes < current.chunk_size_bytes);
        assert!(next.batch_size < current.batch_size);
    }

    #[test]
    fn conservative_idle_grows_slightly() {
        let current = TuningParameters { max_workers: 4, chunk_size_bytes: 100_000, batch_size: 4, timeout_factor: 1.0 };
        let next = apply(StrategyKind::Conservative, &snapshot(0.1, 0.1), current);
        assert_eq!(next.max_workers, 5);
        assert!(next.chunk_size_bytes > current.chunk_size_bytes);
        assert_eq!(next.batch_size, 5);
    }

    #[test]
    fn never_violates_universal_bounds() {
        let current = TuningParameters { max_workers: 1, chunk_size_bytes: 1024, batch_size: 1, timeout_factor: 1.0 };
        let next = apply(StrategyKind::Aggressive, &snapshot(0.95, 0.99), current);
        assert!(next.max_workers >= 1);
        assert!(next.chunk_size_bytes >= 1024);
        assert!(next.batch_size >= 1);
    }

    #[test]
    fn worker_growth_never_exceeds_double_logical_cores() {
        let current = TuningParameters { max_workers: 16, chunk_size_bytes: 100_000, batch_size: 4, timeout_factor: 1.0 };
        let next = apply(StrategyKind::Aggressive, &snapshot(0.1, 0.1), current);
        assert!(next.max_workers <= 16);
    }

    #[test]
    fn energy_efficient_only_kicks_in_under_critical_battery() {
        let current = TuningParameters { max_workers: 4, chunk_size_bytes: 100_000, batch_size: 4, timeout_factor: 1.0 };
        let mut snap = snapshot(0.5, 0.5);
        snap.on_battery = true;
        snap.battery_percent = 0.5;
        let next = apply(StrategyKind::EnergyEfficient, &snap, current);
        assert_eq!(next.max_workers, current.max_workers);

        snap.battery_percent = 0.1;
        let next = apply(StrategyKind::EnergyEfficient, &snap, current);
        assert_eq!(next.max_workers, 1);
        assert_eq!(next.batch_size, 1);
    }

    #[test]
    fn container_aware_caps_workers_to_cpu_limit() {
        let capped = container_worker_cap(
            &ResourceSnapshot { container_cpu_limit: Some(2.0), ..ResourceSnapshot::default() },
            10,
        );
        assert_eq!(capped, 1);
    }
}
