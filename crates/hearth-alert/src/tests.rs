use crate::defaults::{default_rules, Thresholds};
use crate::engine::RuleEngine;
use crate::error::RuleError;
use crate::rules::{CompareOp, PredicateRule, RuleSpec, ThresholdRule};
use crate::suppression::SuppressionPolicy;
use crate::AlertRule;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hearth_common::types::{MetricSample, MetricsSnapshot, Severity};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
}

fn snapshot(now: DateTime<Utc>, samples: &[(&str, f64)]) -> MetricsSnapshot {
    MetricsSnapshot::new(
        now,
        samples
            .iter()
            .map(|(name, value)| MetricSample::new(*name, *value, now))
            .collect(),
    )
}

fn cpu_rule() -> Box<dyn AlertRule> {
    Box::new(ThresholdRule::new(
        "HighCPUUsage",
        "cpu.usage",
        CompareOp::GreaterThan,
        85.0,
        Severity::Warning,
        "system",
    ))
}

#[test]
fn threshold_rule_fires_above_limit() {
    let rule = cpu_rule();
    let fired = rule.evaluate(&snapshot(t0(), &[("cpu.usage", 90.0)])).unwrap();
    assert_eq!(fired.as_deref(), Some("cpu.usage is above 85.0 (current 90.0)"));

    assert!(rule
        .evaluate(&snapshot(t0(), &[("cpu.usage", 85.0)]))
        .unwrap()
        .is_none());
    assert!(rule.evaluate(&snapshot(t0(), &[])).unwrap().is_none());
}

#[test]
fn threshold_rule_matches_any_labelled_series() {
    let rule = ThresholdRule::new(
        "HighDiskUsage",
        "disk.used_percent",
        CompareOp::GreaterThan,
        85.0,
        Severity::Warning,
        "system",
    );
    let now = t0();
    let snap = MetricsSnapshot::new(
        now,
        vec![
            MetricSample::labelled("disk.used_percent", 40.0, "mount", "/", now),
            MetricSample::labelled("disk.used_percent", 91.0, "mount", "/data", now),
        ],
    );
    let message = rule.evaluate(&snap).unwrap().unwrap();
    assert!(message.contains("mount=/data"), "{message}");
}

#[test]
fn single_cycle_above_threshold_produces_one_warning() {
    let mut engine = RuleEngine::with_rules(SuppressionPolicy::default(), vec![cpu_rule()]).unwrap();
    let alerts = engine.check_metrics(&snapshot(t0(), &[("cpu.usage", 90.0)]), t0());

    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert.rule_name, "HighCPUUsage");
    assert_eq!(alert.severity, Severity::Warning);
    assert_eq!(alert.category, "system");
    assert_eq!(alert.metrics_snapshot["cpu.usage"], 90.0);
    assert!(!alert.resolved);
}

#[test]
fn suppression_allows_one_alert_per_window() {
    let policy = SuppressionPolicy {
        default_secs: 300,
        ..Default::default()
    };
    let mut engine = RuleEngine::with_rules(policy, vec![cpu_rule()]).unwrap();
    let start = t0();

    // condition stays true every 5s for just under the window
    let mut fired = 0;
    for tick in 0..60 {
        let now = start + Duration::seconds(tick * 5);
        fired += engine
            .check_metrics(&snapshot(now, &[("cpu.usage", 97.0)]), now)
            .len();
    }
    assert_eq!(fired, 1);
    assert!(engine.is_suppressed("HighCPUUsage", start + Duration::seconds(299)));

    let after = start + Duration::seconds(300);
    let alerts = engine.check_metrics(&snapshot(after, &[("cpu.usage", 97.0)]), after);
    assert_eq!(alerts.len(), 1);

    let again = after + Duration::seconds(5);
    assert!(engine
        .check_metrics(&snapshot(again, &[("cpu.usage", 97.0)]), again)
        .is_empty());
}

#[test]
fn zero_window_severity_is_never_suppressed() {
    let mut policy = SuppressionPolicy::default();
    policy.per_severity.insert(Severity::Critical, 0);
    let rule = ThresholdRule::new(
        "CriticalCPUUsage",
        "cpu.usage",
        CompareOp::GreaterThan,
        95.0,
        Severity::Critical,
        "system",
    );
    let mut engine = RuleEngine::with_rules(policy, vec![Box::new(rule)]).unwrap();

    for tick in 0..3 {
        let now = t0() + Duration::seconds(tick);
        assert_eq!(
            engine
                .check_metrics(&snapshot(now, &[("cpu.usage", 99.0)]), now)
                .len(),
            1
        );
    }
    assert_eq!(engine.suppression_count(), 0);
}

#[test]
fn rule_override_beats_severity_tier() {
    let mut policy = SuppressionPolicy::default();
    policy.per_severity.insert(Severity::Warning, 600);
    assert_eq!(policy.window_secs(Severity::Warning, None), 600);
    assert_eq!(policy.window_secs(Severity::Warning, Some(10)), 10);
    assert_eq!(policy.window_secs(Severity::Info, None), 300);

    let rule = ThresholdRule::new(
        "HighCPUUsage",
        "cpu.usage",
        CompareOp::GreaterThan,
        85.0,
        Severity::Warning,
        "system",
    )
    .with_silence_secs(10);
    let mut engine = RuleEngine::with_rules(policy, vec![Box::new(rule)]).unwrap();
    let snap = snapshot(t0(), &[("cpu.usage", 90.0)]);
    assert_eq!(engine.check_metrics(&snap, t0()).len(), 1);
    assert!(engine.check_metrics(&snap, t0() + Duration::seconds(9)).is_empty());
    assert_eq!(engine.check_metrics(&snap, t0() + Duration::seconds(10)).len(), 1);
}

#[test]
fn panicking_and_failing_rules_do_not_stop_evaluation() {
    let panicking = PredicateRule::new("Broken", Severity::Critical, "test", |_| {
        panic!("predicate bug")
    });

    struct Failing;
    impl AlertRule for Failing {
        fn name(&self) -> &str {
            "Failing"
        }
        fn severity(&self) -> Severity {
            Severity::Warning
        }
        fn category(&self) -> &str {
            "test"
        }
        fn evaluate(&self, _: &MetricsSnapshot) -> anyhow::Result<Option<String>> {
            anyhow::bail!("metric missing")
        }
    }

    let mut engine = RuleEngine::with_rules(
        SuppressionPolicy::default(),
        vec![Box::new(panicking), Box::new(Failing), cpu_rule()],
    )
    .unwrap();

    let alerts = engine.check_metrics(&snapshot(t0(), &[("cpu.usage", 90.0)]), t0());
    let names: Vec<&str> = alerts.iter().map(|a| a.rule_name.as_str()).collect();
    assert_eq!(names, vec!["HighCPUUsage"]);
    assert!(!engine.is_suppressed("Broken", t0()));
}

#[test]
fn alerts_follow_registration_order() {
    let rules = default_rules(&Thresholds::default());
    let mut engine = RuleEngine::with_rules(SuppressionPolicy::default(), rules).unwrap();
    let alerts = engine.check_metrics(
        &snapshot(t0(), &[("cpu.usage", 99.0), ("memory.used_percent", 92.0)]),
        t0(),
    );
    let names: Vec<&str> = alerts.iter().map(|a| a.rule_name.as_str()).collect();
    assert_eq!(names, vec!["HighCPUUsage", "CriticalCPUUsage", "HighMemoryUsage"]);
}

#[test]
fn duplicate_names_are_rejected() {
    let mut engine = RuleEngine::new(SuppressionPolicy::default());
    engine.add_rule(cpu_rule()).unwrap();
    assert!(matches!(engine.add_rule(cpu_rule()), Err(RuleError::Duplicate(name)) if name == "HighCPUUsage"));
    assert_eq!(engine.len(), 1);
}

#[test]
fn disabled_rules_are_skipped() {
    let mut engine = RuleEngine::with_rules(SuppressionPolicy::default(), vec![cpu_rule()]).unwrap();
    engine.set_enabled("HighCPUUsage", false).unwrap();
    assert!(engine
        .check_metrics(&snapshot(t0(), &[("cpu.usage", 99.0)]), t0())
        .is_empty());
    assert!(!engine.rules()[0].enabled);
    assert!(matches!(
        engine.set_enabled("Nope", true),
        Err(RuleError::NotFound(_))
    ));

    engine.set_enabled("HighCPUUsage", true).unwrap();
    assert_eq!(
        engine
            .check_metrics(&snapshot(t0(), &[("cpu.usage", 99.0)]), t0())
            .len(),
        1
    );
}

#[test]
fn prune_drops_only_expired_entries() {
    let mut engine = RuleEngine::with_rules(SuppressionPolicy::default(), vec![cpu_rule()]).unwrap();
    engine.check_metrics(&snapshot(t0(), &[("cpu.usage", 99.0)]), t0());
    assert_eq!(engine.prune_expired(t0() + Duration::seconds(10)), 0);
    assert_eq!(engine.prune_expired(t0() + Duration::seconds(300)), 1);
    assert_eq!(engine.suppression_count(), 0);
}

#[test]
fn pool_exhaustion_needs_waiters_and_no_idle() {
    let rules = default_rules(&Thresholds::default());
    let mut engine = RuleEngine::with_rules(SuppressionPolicy::default(), rules).unwrap();

    let healthy = snapshot(t0(), &[("db.pool.waiting", 2.0), ("db.pool.idle", 1.0)]);
    assert!(engine.check_metrics(&healthy, t0()).is_empty());

    let exhausted = snapshot(t0(), &[("db.pool.waiting", 2.0), ("db.pool.idle", 0.0)]);
    let alerts = engine.check_metrics(&exhausted, t0());
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].rule_name, "DatabasePoolExhausted");
    assert_eq!(alerts[0].severity, Severity::Critical);
}

#[test]
fn cache_rules_wait_for_lookups() {
    let rules = default_rules(&Thresholds::default());
    let mut engine = RuleEngine::with_rules(SuppressionPolicy::default(), rules).unwrap();

    let idle = snapshot(t0(), &[("cache.hit_rate", 0.0), ("cache.hits_total", 0.0)]);
    assert!(engine.check_metrics(&idle, t0()).is_empty());

    let cold = snapshot(
        t0(),
        &[("cache.hit_rate", 40.0), ("cache.hits_total", 4.0), ("cache.misses_total", 6.0)],
    );
    let names: Vec<String> = engine
        .check_metrics(&cold, t0())
        .into_iter()
        .map(|a| a.rule_name)
        .collect();
    assert_eq!(names, vec!["LowCacheHitRate", "CriticalCacheHitRate"]);
}

#[test]
fn rule_specs_parse_from_config() {
    #[derive(serde::Deserialize)]
    struct Wrapper {
        rules: Vec<RuleSpec>,
    }
    let parsed: Wrapper = toml::from_str(
        r#"
        [[rules]]
        name = "SlowImports"
        metric = "business.failure_rate"
        operator = "gte"
        threshold = 50.0
        severity = "critical"
        "#,
    )
    .unwrap();
    let spec = &parsed.rules[0];
    assert!(spec.enabled);
    assert_eq!(spec.category, "custom");

    let rule = spec.build().unwrap();
    assert_eq!(rule.operator, CompareOp::GreaterEqual);

    let bad = RuleSpec {
        operator: "between".to_string(),
        ..spec.clone()
    };
    assert!(matches!(bad.build(), Err(RuleError::Invalid { .. })));
}

#[test]
fn suppression_policy_reads_severity_table() {
    let policy: SuppressionPolicy = toml::from_str(
        r#"
        default_secs = 120
        [per_severity]
        critical = 0
        "#,
    )
    .unwrap();
    assert_eq!(policy.window_secs(Severity::Critical, None), 0);
    assert_eq!(policy.window_secs(Severity::Warning, None), 120);
}
