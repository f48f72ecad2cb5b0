//! Sweep statistics collection for `--stats` output.

use std::time::{Duration, Instant};

/// Collects phase timings and artifact counters over a whole sweep.
///
/// Created when `--stats` is passed, threaded as `Option<&mut Stats>`.
pub struct Stats {
    total_start: Instant,
    /// Accumulated time per phase, in first-seen order.
    phases: Vec<(&'static str, Duration)>,
    pub runs: u32,
    pub artifacts_produced: u32,
    pub artifacts_missing: u32,
    pub recoveries: u32,
    pub outputs_delivered: u32,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            total_start: Instant::now(),
            phases: Vec::new(),
            runs: 0,
            artifacts_produced: 0,
            artifacts_missing: 0,
            recoveries: 0,
            outputs_delivered: 0,
        }
    }

    /// Add `duration` to the named phase.
    pub fn add_phase(&mut self, name: &'static str, duration: Duration) {
        match self.phases.iter_mut().find(|(n, _)| *n == name) {
            Some((_, total)) => *total += duration,
            None => self.phases.push((name, duration)),
        }
    }

    pub fn phase(&self, name: &str) -> Option<Duration> {
        self.phases.iter().find(|(n, _)| *n == name).map(|(_, d)| *d)
    }

    /// Print the stats table to stderr.
    pub fn display(&self) {
        let total = self.total_start.elapsed();
        eprintln!();
        eprintln!("=== ltsweep Stats ===");

        for (name, dur) in &self.phases {
            eprintln!("  {:<24} {:>8.3}s", name, dur.as_secs_f64());
        }

        eprintln!("  Runs:                   {}", self.runs);
        eprintln!(
            "  Raw files:              produced={}  missing={}",
            self.artifacts_produced, self.artifacts_missing
        );
        if self.recoveries > 0 {
            eprintln!("  Re-simulations:         {}", self.recoveries);
        }
        eprintln!("  Outputs delivered:      {}", self.outputs_delivered);
        eprintln!("  ─────────────────────────────────");
        eprintln!("  Total:                  {:>8.3}s", total.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phases_accumulate() {
        let mut stats = Stats::new();
        stats.add_phase("simulate", Duration::from_millis(10));
        stats.add_phase("edit", Duration::from_millis(1));
        stats.add_phase("simulate", Duration::from_millis(15));
        assert_eq!(stats.phase("simulate"), Some(Duration::from_millis(25)));
        assert_eq!(stats.phase("edit"), Some(Duration::from_millis(1)));
        assert_eq!(stats.phase("deliver"), None);
    }
}
