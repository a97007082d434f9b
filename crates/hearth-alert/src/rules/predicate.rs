use crate::AlertRule;
use hearth_common::types::{MetricsSnapshot, Severity};

type Predicate = dyn Fn(&MetricsSnapshot) -> Option<String> + Send + Sync;

/// A rule backed by an arbitrary closure returning the alert message when it
/// fires. Used for conditions spanning several metrics.
pub struct PredicateRule {
    name: String,
    severity: Severity,
    category: String,
    silence_secs: Option<u64>,
    predicate: Box<Predicate>,
}

impl PredicateRule {
    pub fn new<F>(
        name: impl Into<String>,
        severity: Severity,
        category: impl Into<String>,
        predicate: F,
    ) -> Self
    where
        F: Fn(&MetricsSnapshot) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            severity,
            category: category.into(),
            silence_secs: None,
            predicate: Box::new(predicate),
        }
    }

    pub fn with_silence_secs(mut self, secs: u64) -> Self {
        self.silence_secs = Some(secs);
        self
    }
}

impl AlertRule for PredicateRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn silence_secs(&self) -> Option<u64> {
        self.silence_secs
    }

    fn evaluate(&self, snapshot: &MetricsSnapshot) -> anyhow::Result<Option<String>> {
        Ok((self.predicate)(snapshot))
    }
}
