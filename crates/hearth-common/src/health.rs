use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Health flag owned by one component and read by the `/health` surface.
///
/// Writers flip it from whichever task observes a success or failure;
/// readers take a [`ComponentStatus`] copy.
#[derive(Debug)]
pub struct ComponentHealth {
    name: &'static str,
    healthy: AtomicBool,
    detail: Mutex<Detail>,
}

#[derive(Debug, Default)]
struct Detail {
    last_update: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentStatus {
    pub healthy: bool,
    pub last_update: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ComponentHealth {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            healthy: AtomicBool::new(true),
            detail: Mutex::new(Detail::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn mark_healthy(&self, now: DateTime<Utc>) {
        self.healthy.store(true, Ordering::Release);
        let mut detail = self.detail.lock().unwrap_or_else(|p| p.into_inner());
        detail.last_update = Some(now);
        detail.last_error = None;
    }

    pub fn mark_failed(&self, error: impl Into<String>) {
        let was_healthy = self.healthy.swap(false, Ordering::AcqRel);
        let error = error.into();
        if was_healthy {
            tracing::warn!(component = self.name, error = %error, "Component degraded");
        }
        let mut detail = self.detail.lock().unwrap_or_else(|p| p.into_inner());
        detail.last_error = Some(error);
    }

    pub fn status(&self) -> ComponentStatus {
        let detail = self.detail.lock().unwrap_or_else(|p| p.into_inner());
        ComponentStatus {
            healthy: self.is_healthy(),
            last_update: detail.last_update,
            last_error: detail.last_error.clone(),
        }
    }
}
