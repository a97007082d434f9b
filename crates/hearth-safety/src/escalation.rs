//! Rolling-window escalation of repeated failures.

use crate::config::EscalationConfig;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    CriticalErrors,
    FailedRepairs,
}

impl std::fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EscalationReason::CriticalErrors => write!(f, "critical_errors"),
            EscalationReason::FailedRepairs => write!(f, "failed_repairs"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationStatus {
    Open,
    Acknowledged,
}

#[derive(Debug, Clone, Serialize)]
pub struct EscalationRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub component: String,
    pub reason: EscalationReason,
    /// Events of this kind inside the window when it fired.
    pub count: usize,
    pub status: EscalationStatus,
}

#[derive(Debug, Clone)]
struct Event {
    at: DateTime<Utc>,
    component: String,
    reason: EscalationReason,
}

/// Keeps recent failure events and fires once per `(component, reason)`
/// burst. A key re-arms only after every one of its events has aged out of
/// the window, so a sustained burst escalates once.
#[derive(Debug)]
pub struct EscalationTracker {
    config: EscalationConfig,
    events: VecDeque<Event>,
    fired: HashSet<(String, EscalationReason)>,
    records: Vec<EscalationRecord>,
}

/// Escalation records kept for the status surface.
const MAX_RECORDS: usize = 100;

impl EscalationTracker {
    pub fn new(config: EscalationConfig) -> Self {
        Self {
            config,
            events: VecDeque::new(),
            fired: HashSet::new(),
            records: Vec::new(),
        }
    }

    fn threshold(&self, reason: EscalationReason) -> usize {
        match reason {
            EscalationReason::CriticalErrors => self.config.critical_error_threshold,
            EscalationReason::FailedRepairs => self.config.failed_repair_threshold,
        }
        .max(1)
    }

    fn count(&self, component: &str, reason: EscalationReason) -> usize {
        self.events
            .iter()
            .filter(|e| e.reason == reason && e.component == component)
            .count()
    }

    /// Records one event and returns a new escalation when this event
    /// pushed the count for its key to the threshold.
    pub fn record(
        &mut self,
        component: &str,
        reason: EscalationReason,
        now: DateTime<Utc>,
    ) -> Option<EscalationRecord> {
        self.prune(now);
        self.events.push_back(Event {
            at: now,
            component: component.to_string(),
            reason,
        });

        let count = self.count(component, reason);
        if count < self.threshold(reason) {
            return None;
        }
        if !self.fired.insert((component.to_string(), reason)) {
            return None;
        }

        let record = EscalationRecord {
            id: hearth_common::id::next_id(),
            timestamp: now,
            component: component.to_string(),
            reason,
            count,
            status: EscalationStatus::Open,
        };
        if self.records.len() == MAX_RECORDS {
            self.records.remove(0);
        }
        self.records.push(record.clone());
        Some(record)
    }

    /// Drops events older than the window and re-arms keys with no events
    /// left in it.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let horizon = now - Duration::seconds(self.config.window_secs as i64);
        while self.events.front().is_some_and(|e| e.at <= horizon) {
            self.events.pop_front();
        }
        let events = &self.events;
        self.fired.retain(|(component, reason)| {
            events
                .iter()
                .any(|e| e.reason == *reason && e.component == *component)
        });
    }

    pub fn acknowledge(&mut self, id: &str) -> bool {
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.status = EscalationStatus::Acknowledged;
                true
            }
            None => false,
        }
    }

    /// Most recent first.
    pub fn records(&self) -> Vec<EscalationRecord> {
        self.records.iter().rev().cloned().collect()
    }
}
