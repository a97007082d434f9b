use crate::Collector;
use anyhow::Result;
use chrono::{DateTime, Utc};
use hearth_common::types::MetricSample;
use sysinfo::System;

/// Load average and uptime. Both are static lookups, so the collector holds
/// no state.
#[derive(Default)]
pub struct LoadCollector;

impl LoadCollector {
    pub fn new() -> Self {
        Self
    }
}

impl Collector for LoadCollector {
    fn name(&self) -> &str {
        "load"
    }

    fn collect(&mut self, now: DateTime<Utc>) -> Result<Vec<MetricSample>> {
        let load = System::load_average();
        Ok(vec![
            MetricSample::new("system.load_1", load.one, now),
            MetricSample::new("system.load_5", load.five, now),
            MetricSample::new("system.load_15", load.fifteen, now),
            MetricSample::new("system.uptime", System::uptime() as f64, now),
        ])
    }
}
