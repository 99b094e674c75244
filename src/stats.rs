use std::fmt;
use std::time::Duration;

/// Statistics collected during one `parallel_map` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapStats {
    pub items_read: usize,
    pub chunks_dispatched: usize,
    pub results_received: usize,
    pub results_delivered: usize,
    pub worker_faults: usize,
    pub input_faults: usize,
    /// Largest number of results parked in the reorder buffer
    pub max_reorder_depth: usize,
    pub elapsed: Duration,
}

impl MapStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> usize {
        self.worker_faults + self.input_faults
    }

    /// Delivered results per second over the call's lifetime
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.results_delivered as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for MapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Items read: {}", self.items_read)?;
        writeln!(f, "Chunks dispatched: {}", self.chunks_dispatched)?;
        writeln!(
            f,
            "Results: {} received, {} delivered",
            self.results_received, self.results_delivered
        )?;
        if self.faults() > 0 {
            writeln!(
                f,
                "Faults: {} worker, {} input",
                self.worker_faults, self.input_faults
            )?;
        }
        writeln!(f, "Max reorder depth: {}", self.max_reorder_depth)?;
        write!(
            f,
            "Elapsed: {:.3}s ({:.0} results/s)",
            self.elapsed.as_secs_f64(),
            self.throughput()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput_handles_zero_elapsed() {
        let stats = MapStats::new();
        assert_eq!(stats.throughput(), 0.0);
    }

    #[test]
    fn test_display_omits_fault_line_when_clean() {
        let stats = MapStats {
            items_read: 10,
            chunks_dispatched: 5,
            results_received: 10,
            results_delivered: 10,
            elapsed: Duration::from_secs(2),
            ..Default::default()
        };
        let text = stats.to_string();
        assert!(text.contains("Items read: 10"));
        assert!(text.contains("(5 results/s)"));
        assert!(!text.contains("Faults"));

        let faulty = MapStats {
            worker_faults: 2,
            input_faults: 1,
            ..stats
        };
        assert_eq!(faulty.faults(), 3);
        assert!(faulty.to_string().contains("Faults: 2 worker, 1 input"));
    }
}
