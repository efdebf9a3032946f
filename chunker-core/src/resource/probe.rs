use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Context;
use sysinfo::{CpuRefreshKind, RefreshKind, System};

/// Immutable point-in-time system reading. Every field defaults to 0 (or the
/// conservative equivalent) on collection failure — the probe must never
/// throw (spec.md §4.1).
#[derive(Debug, Clone, Copy)]
pub struct ResourceSnapshot {
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub swap_percent: f64,
    pub cpu_count: usize,
    pub logical_cores: usize,
    pub mem_total_bytes: u64,
    pub mem_avail_bytes: u64,
    pub load_normalised: f64,
    pub io_wait_percent: f64,
    pub disk_percent: f64,
    pub on_battery: bool,
    pub battery_percent: f64,
    pub container_mem_used_percent: f64,
    pub container_mem_limit: Option<u64>,
    pub container_cpu_limit: Option<f64>,
    pub taken_at: Instant,
}

impl Default for ResourceSnapshot {
    fn default() -> Self {
        Self {
            cpu_percent: 0.0,
            mem_percent: 0.0,
            swap_percent: 0.0,
            cpu_count: 1,
            logical_cores: 1,
            mem_total_bytes: 0,
            mem_avail_bytes: 0,
            load_normalised: 0.0,
            io_wait_percent: 0.0,
            disk_percent: 0.0,
            on_battery: false,
            battery_percent: 1.0,
            container_mem_used_percent: 0.0,
            container_mem_limit: None,
            container_cpu_limit: None,
            taken_at: Instant::now(),
        }
    }
}

struct Cached {
    snapshot: ResourceSnapshot,
    taken_at: Instant,
}

/// Samples CPU/memory/load/container/battery state. Caches the last reading
/// for up to `probe_interval / 2` so bursts of `snapshot()` calls stay cheap.
pub struct ResourceProbe {
    system: Mutex<System>,
    probe_interval: Duration,
    cache: Mutex<Option<Cached>>,
}

impl ResourceProbe {
    pub fn new(probe_interval: Duration) -> Self {
        let system = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(sysinfo::MemoryRefreshKind::everything()),
        );
        Self {
            system: Mutex::new(system),
            probe_interval,
            cache: Mutex::new(None),
        }
    }

    /// Produce a fresh snapshot, or reuse the cached one if it is fresher than
    /// `probe_interval / 2`.
    pub fn snapshot(&self) -> ResourceSnapshot {
        if let Ok(cache) = self.cache.lock() {
            if let Some(cached) = cache.as_ref() {
                if cached.taken_at.elapsed() < self.probe_interval / 2 {
                    return cached.snapshot;
                }
            }
        }

        let snapshot = self.collect();

        if let Ok(mut cache) = self.cache.lock() {
            *cache = Some(Cached {
                snapshot,
                taken_at: Instant::now(),
            });
        }

        snapshot
    }

    fn collect(&self) -> ResourceSnapshot {
        let mut snapshot = ResourceSnapshot::default();

        let Ok(mut system) = self.system.lock() else {
            return snapshot;
        };
        system.refresh_cpu();
        system.refresh_memory();

        let physical_cores = system.physical_core_count().unwrap_or(1).max(1);
        let logical = std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(physical_cores)
            .max(1);

        let cpu_limit = cgroup_cpu_limit();
        let logical_cores = match cpu_limit {
            Some(limit) if limit > 0.0 => (limit.ceil() as usize).clamp(1, logical),
            _ => logical,
        };

        let cpus = system.cpus();
        let cpu_percent = if cpus.is_empty() {
            0.0
        } else {
            (cpus.iter().map(|c| c.cpu_usage() as f64).sum::<f64>() / cpus.len() as f64) / 100.0
        };

        let mem_total = system.total_memory();
        let mem_avail = system.available_memory();
        let mem_percent = if mem_total > 0 {
            1.0 - (mem_avail as f64 / mem_total as f64)
        } else {
            0.0
        };

        let swap_total = system.total_swap();
        let swap_used = system.used_swap();
        let swap_percent = if swap_total > 0 {
            swap_used as f64 / swap_total as f64
        } else {
            0.0
        };

        let load = System::load_average();
        let load_normalised = load.one / logical_cores as f64;

        let (container_mem_used_percent, container_mem_limit) = cgroup_memory();
        let (on_battery, battery_percent) = battery_state();

        snapshot.cpu_percent = cpu_percent.clamp(0.0, 1.0);
        snapshot.mem_percent = mem_percent.clamp(0.0, 1.0);
        snapshot.swap_percent = swap_percent.clamp(0.0, 1.0);
        snapshot.cpu_count = physical_cores;
        snapshot.logical_cores = logical_cores;
        snapshot.mem_total_bytes = mem_total;
        snapshot.mem_avail_bytes = mem_avail;
        snapshot.load_normalised = load_normalised.max(0.0);
        snapshot.io_wait_percent = 0.0;
        snapshot.disk_percent = 0.0;
        snapshot.on_battery = on_battery;
        snapshot.battery_percent = battery_percent;
        snapshot.container_mem_used_percent = container_mem_used_percent;
        snapshot.container_mem_limit = container_mem_limit;
        snapshot.container_cpu_limit = cpu_limit;
        snapshot.taken_at = Instant::now();

        snapshot
    }
}

/// cgroup-aware CPU quota, expressed as an equivalent core count. `None` means
/// no limit is in effect (cgroup absent, quota "max", or quota <= 0).
pub fn cgroup_cpu_limit() -> Option<f64> {
    if let Some((quota, period)) = read_cgroup_v2_cpu_max() {
        if quota <= 0 || period == 0 {
            return None;
        }
        return Some(quota as f64 / period as f64);
    }

    if let Some((quota, period)) = read_cgroup_v1_cpu() {
        if quota <= 0 || period <= 0 {
            return None;
        }
        return Some(quota as f64 / period as f64);
    }

    None
}

fn read_cgroup_v2_cpu_max() -> Option<(i64, u64)> {
    try_read_cgroup_v2_cpu_max().ok()
}

/// `anyhow`-flavoured inner helper: cgroup v2 reports its CPU quota as a
/// single `"<quota> <period>"` line, or the literal `max` when unbounded.
/// The caller above swallows any error here per the probe's "must never
/// throw" contract (spec.md §4.1) - the `anyhow::Context` messages only ever
/// surface through `tracing`, never to a caller.
fn try_read_cgroup_v2_cpu_max() -> anyhow::Result<(i64, u64)> {
    let content = std::fs::read_to_string("/sys/fs/cgroup/cpu.max").context("reading cgroup v2 cpu.max")?;
    let mut parts = content.split_whitespace();
    let quota_str = parts.next().context("cpu.max missing quota field")?;
    let period_str = parts.next().context("cpu.max missing period field")?;
    let period: u64 = period_str.parse().context("cpu.max period is not an integer")?;
    if quota_str == "max" {
        return Ok((-1, period));
    }
    let quota: i64 = quota_str.parse().context("cpu.max quota is not an integer")?;
    Ok((quota, period))
}

fn read_cgroup_v1_cpu() -> Option<(i64, i64)> {
    try_read_cgroup_v1_cpu().ok()
}

fn try_read_cgroup_v1_cpu() -> anyhow::Result<(i64, i64)> {
    let quota: i64 = std::fs::read_to_string("/sys/fs/cgroup/cpu/cpu.cfs_quota_us")
        .context("reading cgroup v1 cfs_quota_us")?
        .trim()
        .parse()
        .context("cfs_quota_us is not an integer")?;
    let period: i64 = std::fs::read_to_string("/sys/fs/cgroup/cpu/cpu.cfs_period_us")
        .context("reading cgroup v1 cfs_period_us")?
        .trim()
        .parse()
        .context("cfs_period_us is not an integer")?;
    Ok((quota, period))
}

/// cgroup-aware memory usage percent and limit. A v1 limit greater than 2^60
/// means "no limit", per spec.md §4.1.
fn cgroup_memory() -> (f64, Option<u64>) {
    if let (Some(max), Some(current)) = (read_u64_file("/sys/fs/cgroup/memory.max"), read_u64_file("/sys/fs/cgroup/memory.current")) {
        if max == u64::MAX {
            return (0.0, None);
        }
        let percent = if max > 0 { current as f64 / max as f64 } else { 0.0 };
        return (percent.clamp(0.0, 1.0), Some(max));
    }

    let limit = read_u64_file("/sys/fs/cgroup/memory/memory.limit_in_bytes");
    let usage = read_u64_file("/sys/fs/cgroup/memory/memory.usage_in_bytes");
    match (limit, usage) {
        (Some(limit), Some(usage)) if limit <= (1u64 << 60) => {
            let percent = if limit > 0 { usage as f64 / limit as f64 } else { 0.0 };
            (percent.clamp(0.0, 1.0), Some(limit))
        }
        _ => (0.0, None),
    }
}

fn read_u64_file(path: &str) -> Option<u64> {
    let content = std::fs::read_to_string(path).ok()?;
    let trimmed = content.trim();
    if trimmed == "max" {
        return Some(u64::MAX);
    }
    trimmed.parse().ok()
}

/// Best-effort Linux battery detection via `/sys/class/power_supply`. Returns
/// `(on_battery=false, battery_percent=1.0)` when no battery is present or the
/// platform is unsupported, matching the probe's "never throw" contract.
fn battery_state() -> (bool, f64) {
    let Ok(entries) = std::fs::read_dir("/sys/class/power_supply") else {
        return (false, 1.0);
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let type_path = path.join("type");
        let Ok(kind) = std::fs::read_to_string(&type_path) else {
            continue;
        };
        if kind.trim() != "Battery" {
            continue;
        }

        let status = std::fs::read_to_string(path.join("status"))
            .unwrap_or_default()
            .trim()
            .to_string();
        let capacity: f64 = std::fs::read_to_string(path.join("capacity"))
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .unwrap_or(100.0);

        let on_battery = status == "Discharging";
        return (on_battery, (capacity / 100.0).clamp(0.0, 1.0));
    }

    (false, 1.0)
}
