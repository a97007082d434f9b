use crate::error::RuleError;
use crate::AlertRule;
use hearth_common::types::{format_labels, MetricsSnapshot, Severity};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
}

impl FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greater_than" | "gt" | ">" => Ok(Self::GreaterThan),
            "less_than" | "lt" | "<" => Ok(Self::LessThan),
            "greater_equal" | "gte" | ">=" => Ok(Self::GreaterEqual),
            "less_equal" | "lte" | "<=" => Ok(Self::LessEqual),
            _ => Err(format!("unknown compare operator: {s}")),
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GreaterThan => write!(f, "greater_than"),
            Self::LessThan => write!(f, "less_than"),
            Self::GreaterEqual => write!(f, "greater_equal"),
            Self::LessEqual => write!(f, "less_equal"),
        }
    }
}

impl CompareOp {
    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => value > threshold,
            Self::LessThan => value < threshold,
            Self::GreaterEqual => value >= threshold,
            Self::LessEqual => value <= threshold,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::GreaterThan => "above",
            Self::LessThan => "below",
            Self::GreaterEqual => "at or above",
            Self::LessEqual => "at or below",
        }
    }
}

/// Fires when any series of `metric` compares true against `value`. For a
/// labelled metric such as `disk.used_percent` that means any mount.
pub struct ThresholdRule {
    pub name: String,
    pub metric: String,
    pub severity: Severity,
    pub category: String,
    pub operator: CompareOp,
    pub value: f64,
    pub silence_secs: Option<u64>,
}

impl ThresholdRule {
    pub fn new(
        name: impl Into<String>,
        metric: impl Into<String>,
        operator: CompareOp,
        value: f64,
        severity: Severity,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            metric: metric.into(),
            severity,
            category: category.into(),
            operator,
            value,
            silence_secs: None,
        }
    }

    pub fn with_silence_secs(mut self, secs: u64) -> Self {
        self.silence_secs = Some(secs);
        self
    }
}

impl AlertRule for ThresholdRule {
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
        let Some(hit) = snapshot
            .series(&self.metric)
            .find(|s| self.operator.check(s.value, self.value))
        else {
            return Ok(None);
        };

        let labels = format_labels(&hit.labels);
        let labels_display = if labels.is_empty() {
            String::new()
        } else {
            format!(" [{labels}]")
        };
        Ok(Some(format!(
            "{}{} is {} {:.1} (current {:.1})",
            self.metric,
            labels_display,
            self.operator.describe(),
            self.value,
            hit.value,
        )))
    }
}

fn default_true() -> bool {
    true
}

fn default_category() -> String {
    "custom".to_string()
}

/// A threshold rule as declared in configuration (`[[alert.rules]]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    pub metric: String,
    pub operator: String,
    pub threshold: f64,
    pub severity: Severity,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub silence_secs: Option<u64>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl RuleSpec {
    pub fn build(&self) -> Result<ThresholdRule, RuleError> {
        if self.name.trim().is_empty() {
            return Err(RuleError::Invalid {
                name: self.name.clone(),
                message: "name must not be empty".to_string(),
            });
        }
        let operator = self.operator.parse::<CompareOp>().map_err(|message| RuleError::Invalid {
            name: self.name.clone(),
            message,
        })?;
        Ok(ThresholdRule {
            name: self.name.clone(),
            metric: self.metric.clone(),
            severity: self.severity,
            category: self.category.clone(),
            operator,
            value: self.threshold,
            silence_secs: self.silence_secs,
        })
    }
}
