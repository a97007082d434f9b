use crate::Collector;
use anyhow::Result;
use chrono::{DateTime, Utc};
use hearth_common::types::MetricSample;
use sysinfo::System;

pub struct MemoryCollector {
    system: System,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for MemoryCollector {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}

impl Collector for MemoryCollector {
    fn name(&self) -> &str {
        "memory"
    }

    fn collect(&mut self, now: DateTime<Utc>) -> Result<Vec<MetricSample>> {
        self.system.refresh_memory();

        let total = self.system.total_memory();
        let used = self.system.used_memory();
        let swap_total = self.system.total_swap();
        let swap_used = self.system.used_swap();

        Ok(vec![
            MetricSample::new("memory.total", total as f64, now),
            MetricSample::new("memory.used", used as f64, now),
            MetricSample::new(
                "memory.available",
                self.system.available_memory() as f64,
                now,
            ),
            MetricSample::new("memory.used_percent", percent(used, total), now),
            MetricSample::new("memory.swap_total", swap_total as f64, now),
            MetricSample::new("memory.swap_used", swap_used as f64, now),
            MetricSample::new("memory.swap_percent", percent(swap_used, swap_total), now),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_of_zero_total_is_zero() {
        assert_eq!(percent(10, 0), 0.0);
        assert_eq!(percent(25, 100), 25.0);
    }
}
