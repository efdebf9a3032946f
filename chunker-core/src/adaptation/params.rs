/// Shared tuning knobs, owned by the Adaptation Manager and read by the
/// chunker (spec.md §3). Readers always observe a fully-formed snapshot since
/// the manager publishes a whole new `Arc<TuningParameters>` rather than
/// mutating fields in place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningParameters {
    pub max_workers: usize,
    pub chunk_size_bytes: usize,
    pub batch_size: usize,
    pub timeout_factor: f64,
}

impl TuningParameters {
    pub fn initial(logical_cores: usize) -> Self {
        Self {
            max_workers: logical_cores.max(1),
            chunk_size_bytes: 100_000,
            batch_size: 4,
            timeout_factor: 1.0,
        }
    }

    /// Clamp to the universal bounds every strategy must respect (spec.md
    /// §4.2 rule 1/2): workers >= 1, chunk_size >= 1024, batch_size >= 1, and
    /// workers never exceed `2 * logical_cores`.
    pub fn clamp_to_bounds(mut self, logical_cores: usize) -> Self {
        self.max_workers = self.max_workers.max(1).min((2 * logical_cores).max(1));
        self.chunk_size_bytes = self.chunk_size_bytes.max(1024);
        self.batch_size = self.batch_size.max(1);
        self.timeout_factor = self.timeout_factor.max(1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_enforces_minimums() {
        let params = TuningParameters {
            max_workers: 0,
            chunk_size_bytes: 10,
            batch_size: 0,
            timeout_factor: 0.5,
        }
        .clamp_to_bounds(4);
        assert_eq!(params.max_workers, 1);
        assert_eq!(params.chunk_size_bytes, 1024);
        assert_eq!(params.batch_size, 1);
        assert_eq!(params.timeout_factor, 1.0);
    }

    #[test]
    fn clamp_caps_workers_at_double_logical_cores() {
        let params = TuningParameters {
            max_workers: 999,
            chunk_size_bytes: 2048,
            batch_size: 4,
            timeout_factor: 1.0,
        }
        .clamp_to_bounds(4);
        assert_eq!(params.max_workers, 8);
    }
}
