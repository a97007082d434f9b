use hearth_common::health::{ComponentHealth, ComponentStatus};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Overall {
    Healthy,
    Degraded,
    Unhealthy,
}

/// One flag per monitored component. The safety flag is down while safe
/// mode is active.
#[derive(Debug)]
pub struct HealthFlags {
    pub collector: Arc<ComponentHealth>,
    pub storage: Arc<ComponentHealth>,
    pub notify: Arc<ComponentHealth>,
    pub safety: Arc<ComponentHealth>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub overall: Overall,
    pub components: BTreeMap<&'static str, ComponentStatus>,
}

impl HealthFlags {
    pub fn new() -> Self {
        Self {
            collector: Arc::new(ComponentHealth::new("collector")),
            storage: Arc::new(ComponentHealth::new("storage")),
            notify: Arc::new(ComponentHealth::new("notify")),
            safety: Arc::new(ComponentHealth::new("safety")),
        }
    }

    fn all(&self) -> [&ComponentHealth; 4] {
        [&*self.collector, &*self.storage, &*self.notify, &*self.safety]
    }

    pub fn overall(&self) -> Overall {
        if !self.collector.is_healthy() || !self.safety.is_healthy() {
            Overall::Unhealthy
        } else if self.all().iter().all(|c| c.is_healthy()) {
            Overall::Healthy
        } else {
            Overall::Degraded
        }
    }

    pub fn report(&self) -> HealthReport {
        HealthReport {
            overall: self.overall(),
            components: self.all().iter().map(|c| (c.name(), c.status())).collect(),
        }
    }
}

impl Default for HealthFlags {
    fn default() -> Self {
        Self::new()
    }
}
