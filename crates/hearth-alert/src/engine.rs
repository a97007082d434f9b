use crate::error::{Result, RuleError};
use crate::suppression::{SuppressionMap, SuppressionPolicy};
use crate::AlertRule;
use chrono::{DateTime, Utc};
use hearth_common::types::{Alert, MetricsSnapshot, Severity};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};

struct Registered {
    rule: Box<dyn AlertRule>,
    enabled: bool,
}

/// Read-only view of a registered rule.
#[derive(Debug, Clone, Serialize)]
pub struct RuleInfo {
    pub name: String,
    pub severity: Severity,
    pub category: String,
    pub enabled: bool,
    pub suppressed_until: Option<DateTime<Utc>>,
}

pub struct RuleEngine {
    rules: Vec<Registered>,
    policy: SuppressionPolicy,
    suppressed: SuppressionMap,
}

impl RuleEngine {
    pub fn new(policy: SuppressionPolicy) -> Self {
        Self {
            rules: Vec::new(),
            policy,
            suppressed: SuppressionMap::default(),
        }
    }

    /// Registers every rule in order, rejecting duplicates.
    pub fn with_rules(policy: SuppressionPolicy, rules: Vec<Box<dyn AlertRule>>) -> Result<Self> {
        let mut engine = Self::new(policy);
        for rule in rules {
            engine.add_rule(rule)?;
        }
        Ok(engine)
    }

    pub fn policy(&self) -> &SuppressionPolicy {
        &self.policy
    }

    /// Add a new rule at runtime. Names are unique.
    pub fn add_rule(&mut self, rule: Box<dyn AlertRule>) -> Result<()> {
        if self.rules.iter().any(|r| r.rule.name() == rule.name()) {
            return Err(RuleError::Duplicate(rule.name().to_string()));
        }
        tracing::debug!(rule = rule.name(), severity = %rule.severity(), "Registered alert rule");
        self.rules.push(Registered {
            rule,
            enabled: true,
        });
        Ok(())
    }

    /// Remove a rule by name. Returns true if found and removed.
    pub fn remove_rule(&mut self, name: &str) -> bool {
        let len_before = self.rules.len();
        self.rules.retain(|r| r.rule.name() != name);
        self.suppressed.remove(name);
        self.rules.len() < len_before
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<()> {
        let entry = self
            .rules
            .iter_mut()
            .find(|r| r.rule.name() == name)
            .ok_or_else(|| RuleError::NotFound(name.to_string()))?;
        entry.enabled = enabled;
        tracing::info!(rule = name, enabled, "Alert rule toggled");
        Ok(())
    }

    pub fn rules(&self) -> Vec<RuleInfo> {
        self.rules
            .iter()
            .map(|r| RuleInfo {
                name: r.rule.name().to_string(),
                severity: r.rule.severity(),
                category: r.rule.category().to_string(),
                enabled: r.enabled,
                suppressed_until: self.suppressed.expires_at(r.rule.name()),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn is_suppressed(&self, name: &str, now: DateTime<Utc>) -> bool {
        self.suppressed.is_suppressed(name, now)
    }

    /// Evaluates every enabled rule in registration order and returns the
    /// alerts that fired outside their suppression window. Each returned
    /// alert starts a new window for its rule.
    pub fn check_metrics(&mut self, snapshot: &MetricsSnapshot, now: DateTime<Utc>) -> Vec<Alert> {
        let mut alerts = Vec::new();
        let mut snapshot_json = None;

        for entry in &self.rules {
            if !entry.enabled {
                continue;
            }
            let rule = entry.rule.as_ref();

            let message = match evaluate_contained(rule, snapshot) {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(rule = rule.name(), error = %e, "Rule evaluation failed");
                    continue;
                }
            };

            if self.suppressed.is_suppressed(rule.name(), now) {
                tracing::debug!(rule = rule.name(), "Alert suppressed (silence period)");
                continue;
            }

            let window = self.policy.window_secs(rule.severity(), rule.silence_secs());
            self.suppressed.suppress(rule.name(), now, window);

            let json = snapshot_json.get_or_insert_with(|| snapshot.to_json());
            tracing::info!(
                rule = rule.name(),
                severity = %rule.severity(),
                category = rule.category(),
                "Alert fired"
            );
            alerts.push(Alert::new(
                rule.name(),
                rule.severity(),
                rule.category(),
                message,
                json.clone(),
                now,
            ));
        }

        alerts
    }

    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        self.suppressed.prune_expired(now)
    }

    pub fn suppression_count(&self) -> usize {
        self.suppressed.len()
    }
}

fn evaluate_contained(
    rule: &dyn AlertRule,
    snapshot: &MetricsSnapshot,
) -> Result<Option<String>> {
    match catch_unwind(AssertUnwindSafe(|| rule.evaluate(snapshot))) {
        Ok(Ok(fired)) => Ok(fired),
        Ok(Err(e)) => Err(RuleError::Evaluation {
            rule: rule.name().to_string(),
            message: e.to_string(),
        }),
        Err(_) => Err(RuleError::Panicked {
            rule: rule.name().to_string(),
        }),
    }
}
