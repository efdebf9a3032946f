use std::time::Duration;

/// Configuration surface for a chunker instance. No file format, no CLI — the
/// chunker is an embedded library; this struct is the only configuration entry
/// point (spec.md §6).
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    pub size_threshold: usize,
    pub complexity_threshold: f64,
    pub force_strategy: Option<ForcedStrategy>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub memory_safety: bool,
    pub adaptive_batch_sizing: bool,
    pub health_check_enabled: bool,
    pub worker_count_override: Option<usize>,
    pub resource_monitor_interval: Duration,
    pub probe_interval: Duration,
    pub adaptation_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedStrategy {
    Simple,
    Advanced,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            size_threshold: 100_000,
            complexity_threshold: 0.5,
            force_strategy: None,
            timeout: Duration::from_secs(300),
            max_retries: 3,
            memory_safety: true,
            adaptive_batch_sizing: true,
            health_check_enabled: true,
            worker_count_override: None,
            resource_monitor_interval: Duration::from_secs(5),
            probe_interval: Duration::from_secs(5),
            adaptation_interval: Duration::from_secs(5),
        }
    }
}

/// Builder for `ChunkerConfig`, mirroring the teacher's plain-struct-plus-default
/// config style rather than a derive-macro builder.
#[derive(Debug, Clone)]
pub struct ChunkerConfigBuilder {
    config: ChunkerConfig,
}

impl Default for ChunkerConfigBuilder {
    fn default() -> Self {
        Self {
            config: ChunkerConfig::default(),
        }
    }
}

impl ChunkerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size_threshold(mut self, bytes: usize) -> Self {
        self.config.size_threshold = bytes;
        self
    }

    pub fn complexity_threshold(mut self, threshold: f64) -> Self {
        self.config.complexity_threshold = threshold;
        self
    }

    pub fn force_strategy(mut self, strategy: Option<ForcedStrategy>) -> Self {
        self.config.force_strategy = strategy;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn memory_safety(mut self, enabled: bool) -> Self {
        self.config.memory_safety = enabled;
        self
    }

    pub fn adaptive_batch_sizing(mut self, enabled: bool) -> Self {
        self.config.adaptive_batch_sizing = enabled;
        self
    }

    pub fn health_check_enabled(mut self, enabled: bool) -> Self {
        self.config.health_check_enabled = enabled;
        self
    }

    pub fn worker_count_override(mut self, workers: Option<usize>) -> Self {
        self.config.worker_count_override = workers;
        self
    }

    pub fn resource_monitor_interval(mut self, interval: Duration) -> Self {
        self.config.resource_monitor_interval = interval;
        self
    }

    pub fn probe_interval(mut self, interval: Duration) -> Self {
        self.config.probe_interval = interval;
        self
    }

    pub fn adaptation_interval(mut self, interval: Duration) -> Self {
        self.config.adaptation_interval = interval;
        self
    }

    pub fn build(self) -> ChunkerConfig {
        self.config
    }
}
