use crate::memory::percent;
use crate::Collector;
use anyhow::Result;
use chrono::{DateTime, Utc};
use hearth_common::types::{Labels, MetricSample};
use sysinfo::Disks;

pub struct DiskCollector {
    disks: Disks,
}

impl DiskCollector {
    pub fn new() -> Self {
        Self {
            disks: Disks::new_with_refreshed_list(),
        }
    }
}

impl Default for DiskCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for DiskCollector {
    fn name(&self) -> &str {
        "disk"
    }

    fn collect(&mut self, now: DateTime<Utc>) -> Result<Vec<MetricSample>> {
        self.disks.refresh();
        let mut samples = Vec::with_capacity(self.disks.list().len() * 4);

        for disk in self.disks.iter() {
            let total = disk.total_space();
            let available = disk.available_space();
            let used = total.saturating_sub(available);

            let mut labels = Labels::new();
            labels.insert(
                "mount".to_string(),
                disk.mount_point().to_string_lossy().to_string(),
            );

            samples.push(MetricSample::with_labels("disk.total", total as f64, labels.clone(), now));
            samples.push(MetricSample::with_labels("disk.used", used as f64, labels.clone(), now));
            samples.push(MetricSample::with_labels(
                "disk.available",
                available as f64,
                labels.clone(),
                now,
            ));
            samples.push(MetricSample::with_labels(
                "disk.used_percent",
                percent(used, total),
                labels,
                now,
            ));
        }

        Ok(samples)
    }
}
