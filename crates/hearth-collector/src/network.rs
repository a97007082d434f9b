use crate::Collector;
use anyhow::Result;
use chrono::{DateTime, Utc};
use hearth_common::types::{Labels, MetricSample};
use std::collections::HashMap;
use sysinfo::Networks;

/// Default link speed used for `network.utilization_percent`.
pub const DEFAULT_LINK_SPEED_MBPS: f64 = 1000.0;

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    received: u64,
    transmitted: u64,
    packets_received: u64,
    packets_transmitted: u64,
}

/// Per-interface traffic. Values are deltas since the previous tick; the
/// first tick after startup (or after an interface appears) reports zero.
pub struct NetworkCollector {
    networks: Networks,
    link_speed_mbps: f64,
    prev: HashMap<String, Counters>,
    last_collect: Option<DateTime<Utc>>,
}

impl NetworkCollector {
    pub fn new(link_speed_mbps: f64) -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
            link_speed_mbps,
            prev: HashMap::new(),
            last_collect: None,
        }
    }
}

impl Default for NetworkCollector {
    fn default() -> Self {
        Self::new(DEFAULT_LINK_SPEED_MBPS)
    }
}

/// Share of the link consumed by `bytes` over `elapsed_secs`, in percent.
/// Zero when either the interval or the link speed is non-positive.
pub fn utilization_percent(bytes: u64, elapsed_secs: f64, link_speed_mbps: f64) -> f64 {
    if elapsed_secs <= 0.0 || link_speed_mbps <= 0.0 {
        return 0.0;
    }
    let bits_per_sec = bytes as f64 * 8.0 / elapsed_secs;
    bits_per_sec / (link_speed_mbps * 1_000_000.0) * 100.0
}

impl Collector for NetworkCollector {
    fn name(&self) -> &str {
        "network"
    }

    fn collect(&mut self, now: DateTime<Utc>) -> Result<Vec<MetricSample>> {
        self.networks.refresh();
        let elapsed_secs = self
            .last_collect
            .map(|prev| (now - prev).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);
        self.last_collect = Some(now);

        let mut samples = Vec::new();
        for (name, data) in self.networks.iter() {
            let current = Counters {
                received: data.total_received(),
                transmitted: data.total_transmitted(),
                packets_received: data.total_packets_received(),
                packets_transmitted: data.total_packets_transmitted(),
            };
            let prev = self.prev.insert(name.clone(), current).unwrap_or(current);

            let rx = current.received.saturating_sub(prev.received);
            let tx = current.transmitted.saturating_sub(prev.transmitted);

            let mut labels = Labels::new();
            labels.insert("interface".to_string(), name.clone());

            let values = [
                ("network.bytes_recv", rx as f64),
                ("network.bytes_sent", tx as f64),
                (
                    "network.packets_recv",
                    current.packets_received.saturating_sub(prev.packets_received) as f64,
                ),
                (
                    "network.packets_sent",
                    current
                        .packets_transmitted
                        .saturating_sub(prev.packets_transmitted) as f64,
                ),
                (
                    "network.utilization_percent",
                    utilization_percent(rx + tx, elapsed_secs, self.link_speed_mbps),
                ),
            ];
            for (metric, value) in values {
                samples.push(MetricSample::with_labels(metric, value, labels.clone(), now));
            }
        }

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utilization_against_link_speed() {
        // 62.5 MB over 5s on a 1 Gbps link = 100 Mbps = 10%
        let pct = utilization_percent(62_500_000, 5.0, 1000.0);
        assert!((pct - 10.0).abs() < 1e-9);
    }

    #[test]
    fn utilization_without_interval_is_zero() {
        assert_eq!(utilization_percent(1_000, 0.0, 1000.0), 0.0);
        assert_eq!(utilization_percent(1_000, 5.0, 0.0), 0.0);
    }
}
