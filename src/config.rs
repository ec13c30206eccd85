use std::time::Duration;

/// Per-request compute budgets.
///
/// The defaults keep a single `step()` cheap enough to run once per rendered
/// frame; tests shrink them to force deferral and suspension paths.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Maximum queue entries popped per `step()` call.
    pub nodes_per_step: usize,
    /// Accumulated point count that must be exceeded before a progress
    /// flush is delivered.
    pub batch_points_threshold: usize,
    /// Wall-clock budget of one filter resume; exceeding it suspends the
    /// filter mid-node.
    pub filter_time_budget: Duration,
    /// The filter checks elapsed time at least every this many points.
    pub filter_check_interval: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            nodes_per_step: 25,
            batch_points_threshold: 100,
            filter_time_budget: Duration::from_millis(4),
            filter_check_interval: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_extraction_config() {
        let c = ExtractionConfig::default();
        assert_eq!(c.nodes_per_step, 25);
        assert_eq!(c.batch_points_threshold, 100);
        assert_eq!(c.filter_time_budget, Duration::from_millis(4));
        assert_eq!(c.filter_check_interval, 1000);
    }
}
