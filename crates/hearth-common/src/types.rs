use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type Labels = HashMap<String, String>;

/// A single measurement. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub value: f64,
    pub labels: Labels,
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    pub fn new(name: impl Into<String>, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            value,
            labels: Labels::new(),
            timestamp,
        }
    }

    pub fn with_labels(
        name: impl Into<String>,
        value: f64,
        labels: Labels,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            value,
            labels,
            timestamp,
        }
    }

    /// Convenience for a single-label sample such as `mount=/`.
    pub fn labelled(
        name: impl Into<String>,
        value: f64,
        key: &str,
        label: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut labels = Labels::new();
        labels.insert(key.to_string(), label.into());
        Self::with_labels(name, value, labels, timestamp)
    }

    /// Identity of the series this sample belongs to.
    pub fn series_key(&self) -> String {
        series_key(&self.name, &self.labels)
    }
}

/// Builds the series identity `name{k=v, ...}` with labels sorted by key.
/// Unlabeled metrics are keyed by their bare name.
///
/// # Examples
///
/// ```
/// use hearth_common::types::{series_key, Labels};
///
/// assert_eq!(series_key("cpu.usage", &Labels::new()), "cpu.usage");
///
/// let mut labels = Labels::new();
/// labels.insert("mount".to_string(), "/".to_string());
/// assert_eq!(series_key("disk.used_percent", &labels), "disk.used_percent{mount=/}");
/// ```
pub fn series_key(name: &str, labels: &Labels) -> String {
    if labels.is_empty() {
        return name.to_string();
    }
    format!("{name}{{{}}}", format_labels(labels))
}

/// Format labels map into a human-readable string, sorted by key.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use hearth_common::types::format_labels;
///
/// let mut labels = HashMap::new();
/// labels.insert("mount".to_string(), "/data".to_string());
/// labels.insert("device".to_string(), "sda1".to_string());
/// assert_eq!(format_labels(&labels), "device=sda1, mount=/data");
/// ```
pub fn format_labels(labels: &Labels) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let mut pairs: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
    pairs.sort();
    pairs.join(", ")
}

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use hearth_common::types::Severity;
///
/// let sev: Severity = "warning".parse().unwrap();
/// assert_eq!(sev, Severity::Warning);
/// assert_eq!(sev.to_string(), "warning");
/// assert!(Severity::Critical > Severity::Info);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// A fired alert. Append-only once dispatched; only `resolved` and
/// `resolved_at` change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub rule_name: String,
    pub severity: Severity,
    pub message: String,
    pub category: String,
    /// Series values at the time the rule fired, keyed by series key.
    pub metrics_snapshot: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn new(
        rule_name: impl Into<String>,
        severity: Severity,
        category: impl Into<String>,
        message: impl Into<String>,
        metrics_snapshot: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: crate::id::next_id(),
            rule_name: rule_name.into(),
            severity,
            message: message.into(),
            category: category.into(),
            metrics_snapshot,
            timestamp,
            resolved: false,
            resolved_at: None,
        }
    }
}

/// Latest value of every live series at one instant.
///
/// Built once per collection cycle and shared read-only with the rule
/// engine, the health surface and the `/metrics` exporter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    /// One sample per series, ordered by series key.
    pub samples: Vec<MetricSample>,
}

impl MetricsSnapshot {
    pub fn new(timestamp: DateTime<Utc>, mut samples: Vec<MetricSample>) -> Self {
        samples.sort_by_key(|s| s.series_key());
        Self { timestamp, samples }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// All series of the given metric name (e.g. every mount of
    /// `disk.used_percent`).
    pub fn series<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MetricSample> + 'a {
        self.samples.iter().filter(move |s| s.name == name)
    }

    /// Value of the unlabeled series `name`, falling back to the first
    /// labeled one.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.series(name)
            .find(|s| s.labels.is_empty())
            .or_else(|| self.series(name).next())
            .map(|s| s.value)
    }

    pub fn max(&self, name: &str) -> Option<f64> {
        self.series(name).map(|s| s.value).reduce(f64::max)
    }

    pub fn min(&self, name: &str) -> Option<f64> {
        self.series(name).map(|s| s.value).reduce(f64::min)
    }

    /// Compact `{series_key: value}` object stored alongside alerts.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .samples
            .iter()
            .map(|s| (s.series_key(), serde_json::json!(s.value)))
            .collect();
        serde_json::Value::Object(map)
    }
}
