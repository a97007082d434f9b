use crate::cpu::CpuCollector;
use crate::disk::DiskCollector;
use crate::error::CollectError;
use crate::load::LoadCollector;
use crate::memory::MemoryCollector;
use crate::network::NetworkCollector;
use crate::Collector;
use chrono::{DateTime, Utc};
use hearth_common::types::MetricSample;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Outcome of one sampling tick.
#[derive(Debug, Default)]
pub struct SampleReport {
    pub samples: Vec<MetricSample>,
    pub failures: Vec<CollectError>,
}

impl SampleReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Polls every registered [`Collector`] once per tick.
///
/// Collectors run in registration order. An error or a panic inside one
/// collector is recorded in the report and the remaining collectors still
/// run.
pub struct MetricSampler {
    collectors: Vec<Box<dyn Collector>>,
}

impl MetricSampler {
    pub fn new() -> Self {
        Self {
            collectors: Vec::new(),
        }
    }

    /// CPU, memory, disk, network and load collectors.
    pub fn with_system_collectors(link_speed_mbps: f64) -> Self {
        let mut sampler = Self::new();
        sampler.register(Box::new(CpuCollector::new()));
        sampler.register(Box::new(MemoryCollector::new()));
        sampler.register(Box::new(DiskCollector::new()));
        sampler.register(Box::new(NetworkCollector::new(link_speed_mbps)));
        sampler.register(Box::new(LoadCollector::new()));
        sampler
    }

    pub fn register(&mut self, collector: Box<dyn Collector>) {
        tracing::debug!(collector = collector.name(), "Registered collector");
        self.collectors.push(collector);
    }

    pub fn collector_names(&self) -> Vec<String> {
        self.collectors.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    pub fn sample(&mut self, now: DateTime<Utc>) -> SampleReport {
        let mut report = SampleReport::default();

        for collector in &mut self.collectors {
            let name = collector.name().to_string();
            match catch_unwind(AssertUnwindSafe(|| collector.collect(now))) {
                Ok(Ok(samples)) => report.samples.extend(samples),
                Ok(Err(e)) => {
                    tracing::warn!(collector = %name, error = %e, "Collection failed");
                    report.failures.push(CollectError::SourceFailed {
                        collector: name,
                        message: e.to_string(),
                    });
                }
                Err(_) => {
                    tracing::error!(collector = %name, "Collector panicked");
                    report.failures.push(CollectError::Panicked { collector: name });
                }
            }
        }

        tracing::debug!(
            count = report.samples.len(),
            failures = report.failures.len(),
            "Collected metrics"
        );
        report
    }
}

impl Default for MetricSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};

    struct Fixed(&'static str, f64);

    impl Collector for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn collect(&mut self, now: DateTime<Utc>) -> Result<Vec<MetricSample>> {
            Ok(vec![MetricSample::new(format!("{}.value", self.0), self.1, now)])
        }
    }

    struct Failing;

    impl Collector for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn collect(&mut self, _now: DateTime<Utc>) -> Result<Vec<MetricSample>> {
            Err(anyhow!("statfs: permission denied"))
        }
    }

    struct Panicking;

    impl Collector for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn collect(&mut self, _now: DateTime<Utc>) -> Result<Vec<MetricSample>> {
            panic!("index out of bounds")
        }
    }

    #[test]
    fn failing_collectors_do_not_abort_the_tick() {
        let mut sampler = MetricSampler::new();
        sampler.register(Box::new(Fixed("cpu", 12.0)));
        sampler.register(Box::new(Failing));
        sampler.register(Box::new(Panicking));
        sampler.register(Box::new(Fixed("memory", 34.0)));

        let report = sampler.sample(Utc::now());

        let names: Vec<&str> = report.samples.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["cpu.value", "memory.value"]);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].collector(), Some("failing"));
        assert!(matches!(report.failures[1], CollectError::Panicked { .. }));
        assert!(!report.is_clean());
    }

    #[test]
    fn samples_carry_the_tick_timestamp() {
        let now = Utc::now();
        let mut sampler = MetricSampler::new();
        sampler.register(Box::new(Fixed("cpu", 1.0)));
        let report = sampler.sample(now);
        assert!(report.is_clean());
        assert_eq!(report.samples[0].timestamp, now);
        assert_eq!(sampler.collector_names(), vec!["cpu".to_string()]);
    }
}
