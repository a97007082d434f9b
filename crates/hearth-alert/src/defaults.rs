use crate::rules::{CompareOp, PredicateRule, ThresholdRule};
use crate::AlertRule;
use hearth_common::types::{MetricsSnapshot, Severity};
use serde::{Deserialize, Serialize};

/// Threshold table for the built-in ruleset. Percentages are 0-100,
/// latencies are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub cpu_warning: f64,
    pub cpu_critical: f64,
    pub memory_warning: f64,
    pub memory_critical: f64,
    pub disk_warning: f64,
    pub disk_critical: f64,
    pub network_warning: f64,
    pub http_error_rate_warning: f64,
    pub http_error_rate_critical: f64,
    pub http_p95_warning_ms: f64,
    pub http_p95_critical_ms: f64,
    pub cache_hit_rate_warning: f64,
    pub cache_hit_rate_critical: f64,
    pub business_failure_rate_warning: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_warning: 85.0,
            cpu_critical: 95.0,
            memory_warning: 90.0,
            memory_critical: 95.0,
            disk_warning: 85.0,
            disk_critical: 95.0,
            network_warning: 80.0,
            http_error_rate_warning: 5.0,
            http_error_rate_critical: 10.0,
            http_p95_warning_ms: 2000.0,
            http_p95_critical_ms: 5000.0,
            cache_hit_rate_warning: 80.0,
            cache_hit_rate_critical: 50.0,
            business_failure_rate_warning: 20.0,
        }
    }
}

fn above(name: &str, metric: &str, value: f64, severity: Severity, category: &str) -> Box<dyn AlertRule> {
    Box::new(ThresholdRule::new(
        name,
        metric,
        CompareOp::GreaterThan,
        value,
        severity,
        category,
    ))
}

fn pool_exhausted(snapshot: &MetricsSnapshot) -> Option<String> {
    let waiting = snapshot.value("db.pool.waiting")?;
    let idle = snapshot.value("db.pool.idle")?;
    (waiting > 0.0 && idle == 0.0).then(|| {
        format!("database pool exhausted: {waiting:.0} waiting, no idle connections")
    })
}

/// Hit rate is only meaningful once lookups have happened.
fn cache_hit_rate_below(snapshot: &MetricsSnapshot, limit: f64) -> Option<String> {
    let lookups = snapshot.value("cache.hits_total").unwrap_or(0.0)
        + snapshot.value("cache.misses_total").unwrap_or(0.0);
    if lookups <= 0.0 {
        return None;
    }
    let rate = snapshot.value("cache.hit_rate")?;
    (rate < limit).then(|| format!("cache hit rate is below {limit:.1}% (current {rate:.1}%)"))
}

/// The built-in ruleset, in evaluation order.
pub fn default_rules(t: &Thresholds) -> Vec<Box<dyn AlertRule>> {
    let cache_warning = t.cache_hit_rate_warning;
    let cache_critical = t.cache_hit_rate_critical;

    vec![
        above("HighCPUUsage", "cpu.usage", t.cpu_warning, Severity::Warning, "system"),
        above("CriticalCPUUsage", "cpu.usage", t.cpu_critical, Severity::Critical, "system"),
        above("HighMemoryUsage", "memory.used_percent", t.memory_warning, Severity::Warning, "system"),
        above(
            "CriticalMemoryUsage",
            "memory.used_percent",
            t.memory_critical,
            Severity::Critical,
            "system",
        ),
        above("HighDiskUsage", "disk.used_percent", t.disk_warning, Severity::Warning, "system"),
        above("CriticalDiskUsage", "disk.used_percent", t.disk_critical, Severity::Critical, "system"),
        above(
            "HighNetworkUtilization",
            "network.utilization_percent",
            t.network_warning,
            Severity::Warning,
            "system",
        ),
        above("HighHTTPErrorRate", "http.error_rate", t.http_error_rate_warning, Severity::Warning, "http"),
        above(
            "CriticalHTTPErrorRate",
            "http.error_rate",
            t.http_error_rate_critical,
            Severity::Critical,
            "http",
        ),
        above("SlowHTTPResponses", "http.latency_p95", t.http_p95_warning_ms, Severity::Warning, "http"),
        above(
            "CriticalHTTPLatency",
            "http.latency_p95",
            t.http_p95_critical_ms,
            Severity::Critical,
            "http",
        ),
        Box::new(PredicateRule::new(
            "DatabasePoolExhausted",
            Severity::Critical,
            "database",
            pool_exhausted,
        )),
        Box::new(PredicateRule::new(
            "LowCacheHitRate",
            Severity::Warning,
            "cache",
            move |s| cache_hit_rate_below(s, cache_warning),
        )),
        Box::new(PredicateRule::new(
            "CriticalCacheHitRate",
            Severity::Critical,
            "cache",
            move |s| cache_hit_rate_below(s, cache_critical),
        )),
        above(
            "HighBusinessFailureRate",
            "business.failure_rate",
            t.business_failure_rate_warning,
            Severity::Warning,
            "business",
        ),
    ]
}
