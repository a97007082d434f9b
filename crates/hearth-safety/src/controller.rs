use crate::backup::BackupStore;
use crate::config::SafetyConfig;
use crate::escalation::{EscalationReason, EscalationRecord, EscalationTracker};
use crate::retry::{CooldownInfo, RejectReason, RepairDecision, RetryTracker};
use crate::safe_mode::{self, SafeMode, SafeModeStatus, SystemSignals};
use chrono::{DateTime, Utc};
use hearth_common::types::{Alert, Severity};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Snapshot served by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SafetyStatus {
    pub safe_mode: SafeModeStatus,
    pub cooldowns: Vec<CooldownInfo>,
    /// Attempts counted in the current retry window.
    pub attempts: HashMap<String, u32>,
    pub consecutive_failures: HashMap<String, u32>,
    pub escalations: Vec<EscalationRecord>,
}

/// Repair admission, cooldowns, escalation and safe mode.
///
/// Owned by one task and mutated through `&mut self`; time is always passed
/// in. Escalation notices leave through a bounded channel so the caller
/// never waits on notification delivery.
pub struct SafetyController {
    config: SafetyConfig,
    retry: RetryTracker,
    escalation: EscalationTracker,
    safe_mode: SafeMode,
    consecutive_failures: HashMap<String, u32>,
    backups: BackupStore,
    notices: Option<mpsc::Sender<Alert>>,
}

impl SafetyController {
    pub fn new(config: SafetyConfig) -> Self {
        Self {
            retry: RetryTracker::new(config.retry_window_secs, config.cooldown_secs),
            escalation: EscalationTracker::new(config.escalation.clone()),
            safe_mode: SafeMode::default(),
            consecutive_failures: HashMap::new(),
            backups: BackupStore::new(config.backup_dir.clone(), config.max_backups),
            notices: None,
            config,
        }
    }

    /// Escalations are sent as critical `SafetyEscalation` alerts on `tx`.
    pub fn with_notices(mut self, tx: mpsc::Sender<Alert>) -> Self {
        self.notices = Some(tx);
        self
    }

    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    /// Decides whether `component` may be repaired now. An allowed attempt
    /// counts against the component's budget for the current window.
    pub fn can_attempt_repair(&mut self, component: &str, now: DateTime<Utc>) -> RepairDecision {
        if self.safe_mode.is_active() {
            tracing::debug!(component, "Repair rejected, safe mode active");
            return RepairDecision::reject(RejectReason::SafeMode);
        }
        let max = self.config.max_retries_for(component);
        let decision = self.retry.admit(component, max, now);
        tracing::debug!(
            component,
            allowed = decision.allowed,
            reason = ?decision.reason,
            "Repair admission"
        );
        decision
    }

    /// Records the outcome of an admitted attempt. The attempt itself was
    /// already counted by [`Self::can_attempt_repair`]. Failures feed
    /// escalation and the consecutive-failure safe-mode trigger.
    pub fn record_repair_attempt(
        &mut self,
        component: &str,
        success: bool,
        now: DateTime<Utc>,
    ) -> Option<EscalationRecord> {
        if success {
            self.consecutive_failures.remove(component);
            tracing::info!(component, "Repair succeeded");
            return None;
        }

        let failures = self
            .consecutive_failures
            .entry(component.to_string())
            .or_insert(0);
        *failures += 1;
        let failures = *failures;
        tracing::warn!(component, consecutive_failures = failures, "Repair failed");

        let threshold = self.config.safe_mode.consecutive_failures;
        if threshold > 0 && failures >= threshold {
            self.safe_mode.activate(
                format!("{failures} consecutive repair failures for {component}"),
                now,
            );
        }

        self.escalate(component, EscalationReason::FailedRepairs, now)
    }

    /// Records a critical error reported by a monitor for `component`.
    pub fn record_critical_error(
        &mut self,
        component: &str,
        now: DateTime<Utc>,
    ) -> Option<EscalationRecord> {
        self.escalate(component, EscalationReason::CriticalErrors, now)
    }

    fn escalate(
        &mut self,
        component: &str,
        reason: EscalationReason,
        now: DateTime<Utc>,
    ) -> Option<EscalationRecord> {
        let record = self.escalation.record(component, reason, now)?;
        tracing::error!(
            id = %record.id,
            component,
            reason = %reason,
            count = record.count,
            "Escalating to operators"
        );
        if let Some(tx) = &self.notices {
            let alert = escalation_alert(&record, self.config.escalation.window_secs);
            if let Err(e) = tx.try_send(alert) {
                tracing::error!(id = %record.id, error = %e, "Escalation notice dropped");
            }
        }
        Some(record)
    }

    pub fn acknowledge_escalation(&mut self, id: &str) -> bool {
        self.escalation.acknowledge(id)
    }

    /// Checks the stress triggers. Enters safe mode when one holds; leaves
    /// it when none holds and automatic clearing is enabled. Returns whether
    /// safe mode is active afterwards.
    pub fn evaluate_safe_mode(&mut self, signals: &SystemSignals, now: DateTime<Utc>) -> bool {
        let worst = self
            .consecutive_failures
            .iter()
            .max_by_key(|(_, n)| **n)
            .map(|(c, n)| (c.as_str(), *n));
        match safe_mode::trigger(&self.config.safe_mode, signals, worst) {
            Some(reason) => {
                self.safe_mode.activate(reason, now);
            }
            None if self.config.safe_mode.auto_clear => {
                self.safe_mode.deactivate(now, false);
            }
            None => {}
        }
        self.safe_mode.is_active()
    }

    pub fn enter_safe_mode(&mut self, reason: &str, now: DateTime<Utc>) -> bool {
        self.safe_mode.activate(reason, now)
    }

    /// Manual exit. Also forgets consecutive failures so the trigger does
    /// not immediately re-fire.
    pub fn exit_safe_mode(&mut self, now: DateTime<Utc>) -> bool {
        self.consecutive_failures.clear();
        self.safe_mode.deactivate(now, true).is_some()
    }

    pub fn is_safe_mode(&self) -> bool {
        self.safe_mode.is_active()
    }

    /// Periodic cleanup of stale retry windows, cooldowns and escalation
    /// events.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let removed = self.retry.prune(now);
        self.escalation.prune(now);
        if removed > 0 {
            tracing::debug!(removed, "Pruned safety state");
        }
        removed
    }

    pub fn status(&self, now: DateTime<Utc>) -> SafetyStatus {
        SafetyStatus {
            safe_mode: self.safe_mode.status(),
            cooldowns: self.retry.cooldowns(now),
            attempts: self.retry.current_attempts(now),
            consecutive_failures: self.consecutive_failures.clone(),
            escalations: self.escalation.records(),
        }
    }

    /// Cheap handle for async backup I/O outside the controller's owner.
    pub fn backups(&self) -> BackupStore {
        self.backups.clone()
    }
}

pub fn escalation_alert(record: &EscalationRecord, window_secs: u64) -> Alert {
    let what = match record.reason {
        EscalationReason::CriticalErrors => "critical errors",
        EscalationReason::FailedRepairs => "failed repair attempts",
    };
    Alert::new(
        "SafetyEscalation",
        Severity::Critical,
        "safety",
        format!(
            "{} {} for {} within {}s, manual intervention required",
            record.count, what, record.component, window_secs
        ),
        serde_json::json!({
            "escalation_id": record.id,
            "component": record.component,
            "reason": record.reason,
            "count": record.count,
        }),
        record.timestamp,
    )
}
