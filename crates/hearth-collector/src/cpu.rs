use crate::Collector;
use anyhow::Result;
use chrono::{DateTime, Utc};
use hearth_common::types::MetricSample;
use sysinfo::System;

pub struct CpuCollector {
    system: System,
}

impl CpuCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        Self { system }
    }
}

impl Default for CpuCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for CpuCollector {
    fn name(&self) -> &str {
        "cpu"
    }

    fn collect(&mut self, now: DateTime<Utc>) -> Result<Vec<MetricSample>> {
        self.system.refresh_cpu_all();

        let mut samples = vec![MetricSample::new(
            "cpu.usage",
            self.system.global_cpu_usage() as f64,
            now,
        )];
        for (i, cpu) in self.system.cpus().iter().enumerate() {
            samples.push(MetricSample::labelled(
                "cpu.core_usage",
                cpu.cpu_usage() as f64,
                "core",
                i.to_string(),
                now,
            ));
        }

        Ok(samples)
    }
}
