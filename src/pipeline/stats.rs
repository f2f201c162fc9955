//! Estimation statistics.
//!
//! [`EstimationStats`] summarises the estimate calls an orchestrator has seen;
//! [`StatsManager`] records them from any thread.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Counters and timing for depth estimation calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EstimationStats {
    /// Calls that reached the engine.
    pub total_processed: usize,
    /// Calls that produced a depth map.
    pub succeeded: usize,
    /// Calls that failed after reaching the engine.
    pub failed: usize,
    /// Mean wall-clock time per call in milliseconds.
    pub average_time_ms: f64,
}

impl EstimationStats {
    /// Returns the success rate as a percentage (0.0 to 100.0).
    pub fn success_rate(&self) -> f64 {
        if self.total_processed == 0 {
            0.0
        } else {
            (self.succeeded as f64 / self.total_processed as f64) * 100.0
        }
    }

    /// Returns estimations per second at the average call time.
    pub fn estimations_per_second(&self) -> f64 {
        if self.average_time_ms == 0.0 {
            0.0
        } else {
            1000.0 / self.average_time_ms
        }
    }
}

impl fmt::Display for EstimationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Estimation Statistics:")?;
        writeln!(f, "  Total processed: {}", self.total_processed)?;
        writeln!(
            f,
            "  Succeeded: {} ({:.1}%)",
            self.succeeded,
            self.success_rate()
        )?;
        writeln!(f, "  Failed: {}", self.failed)?;
        writeln!(f, "  Average time: {:.2} ms", self.average_time_ms)?;
        Ok(())
    }
}

/// Thread-safe recorder for [`EstimationStats`].
#[derive(Debug, Default)]
pub struct StatsManager {
    stats: Mutex<EstimationStats>,
}

impl StatsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current statistics.
    pub fn get_stats(&self) -> EstimationStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records one finished call.
    pub fn record(&self, succeeded: bool, elapsed: Duration) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        let previous_total = stats.total_processed;
        let total_time = stats.average_time_ms * previous_total as f64
            + elapsed.as_secs_f64() * 1000.0;

        stats.total_processed = previous_total + 1;
        if succeeded {
            stats.succeeded += 1;
        } else {
            stats.failed += 1;
        }
        stats.average_time_ms = total_time / stats.total_processed as f64;
    }

    pub fn reset_stats(&self) {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner) = EstimationStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_handle_zero() {
        let stats = EstimationStats::default();
        assert_eq!(stats.success_rate(), 0.0);
        assert_eq!(stats.estimations_per_second(), 0.0);
    }

    #[test]
    fn test_record_updates_counters_and_average() {
        let manager = StatsManager::new();
        manager.record(true, Duration::from_millis(100));
        manager.record(false, Duration::from_millis(200));

        let stats = manager.get_stats();
        assert_eq!(stats.total_processed, 2);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        assert!((stats.average_time_ms - 150.0).abs() < 1e-9);
        assert_eq!(stats.success_rate(), 50.0);

        let display = stats.to_string();
        assert!(display.contains("Succeeded: 1 (50.0%)"));

        manager.reset_stats();
        assert_eq!(manager.get_stats(), EstimationStats::default());
    }
}
