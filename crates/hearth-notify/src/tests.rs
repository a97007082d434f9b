use crate::channels::{ConsoleChannel, EmailChannel, FileChannel, WebhookChannel};
use crate::config::{EmailConfig, NotifyConfig, WebhookConfig};
use crate::dispatcher::AlertDispatcher;
use crate::error::{NotifyError, Result};
use crate::routing::ChannelRoute;
use crate::NotificationChannel;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use hearth_common::types::{Alert, Severity};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn alert(rule: &str, severity: Severity) -> Alert {
    Alert::new(
        rule,
        severity,
        "system",
        "cpu.usage is above 85.0 (current 90.0)",
        serde_json::json!({ "cpu.usage": 90.0 }),
        Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap(),
    )
}

#[derive(Default)]
struct Counting {
    sent: AtomicUsize,
}

#[async_trait]
impl NotificationChannel for Counting {
    async fn send(&self, _alert: &Alert) -> Result<()> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "counting"
    }
}

struct Failing;

#[async_trait]
impl NotificationChannel for Failing {
    async fn send(&self, _alert: &Alert) -> Result<()> {
        Err(NotifyError::SmtpError("535 authentication failed".to_string()))
    }

    fn channel_name(&self) -> &str {
        "failing"
    }
}

struct Hanging;

#[async_trait]
impl NotificationChannel for Hanging {
    async fn send(&self, _alert: &Alert) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "hanging"
    }
}

#[test]
fn routing_severity_filter() {
    let route_warning = ChannelRoute {
        min_severity: Severity::Warning,
        channel_index: 0,
    };

    assert!(!route_warning.should_send(Severity::Info));
    assert!(route_warning.should_send(Severity::Warning));
    assert!(route_warning.should_send(Severity::Critical));
}

#[tokio::test]
async fn one_failing_channel_does_not_block_others() {
    let counting = Arc::new(Counting::default());
    let mut dispatcher = AlertDispatcher::new(Duration::from_secs(5), 10);
    dispatcher.add_channel(Arc::new(Failing), Severity::Info);
    dispatcher.add_channel(counting.clone(), Severity::Info);

    let report = dispatcher.send(&alert("HighCPUUsage", Severity::Warning)).await;

    assert_eq!(counting.sent.load(Ordering::SeqCst), 1);
    assert_eq!(report.delivered, vec!["counting".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "failing");
    assert!(!report.all_delivered());
}

#[tokio::test(start_paused = true)]
async fn slow_channel_times_out_without_delaying_others() {
    let counting = Arc::new(Counting::default());
    let mut dispatcher = AlertDispatcher::new(Duration::from_millis(200), 10);
    dispatcher.add_channel(Arc::new(Hanging), Severity::Info);
    dispatcher.add_channel(counting.clone(), Severity::Info);

    let report = dispatcher.send(&alert("HighCPUUsage", Severity::Critical)).await;

    assert_eq!(counting.sent.load(Ordering::SeqCst), 1);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].1.contains("200ms"), "{:?}", report.failed);
}

#[tokio::test]
async fn channels_below_min_severity_are_skipped() {
    let pager = Arc::new(Counting::default());
    let log = Arc::new(Counting::default());
    let mut dispatcher = AlertDispatcher::new(Duration::from_secs(5), 10);
    dispatcher.add_channel(pager.clone(), Severity::Critical);
    dispatcher.add_channel(log.clone(), Severity::Info);

    dispatcher.send(&alert("HighCPUUsage", Severity::Warning)).await;
    dispatcher.send(&alert("CriticalCPUUsage", Severity::Critical)).await;

    assert_eq!(pager.sent.load(Ordering::SeqCst), 1);
    assert_eq!(log.sent.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn history_is_bounded_and_most_recent_first() {
    let dispatcher = AlertDispatcher::new(Duration::from_secs(5), 3);
    for (rule, severity) in [
        ("A", Severity::Info),
        ("B", Severity::Warning),
        ("C", Severity::Critical),
        ("D", Severity::Warning),
    ] {
        dispatcher.send(&alert(rule, severity)).await;
    }

    let names: Vec<String> = dispatcher
        .history(10, None)
        .into_iter()
        .map(|a| a.rule_name)
        .collect();
    assert_eq!(names, vec!["D", "C", "B"]);

    let warnings: Vec<String> = dispatcher
        .history(10, Some(Severity::Warning))
        .into_iter()
        .map(|a| a.rule_name)
        .collect();
    assert_eq!(warnings, vec!["D", "B"]);
    assert_eq!(dispatcher.history(1, None).len(), 1);
}

#[tokio::test]
async fn file_channel_appends_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alerts").join("alerts.jsonl");
    let channel = FileChannel::new(&path);

    channel.send(&alert("HighCPUUsage", Severity::Warning)).await.unwrap();
    channel.send(&alert("HighMemoryUsage", Severity::Critical)).await.unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["rule_name"], "HighCPUUsage");
    assert_eq!(lines[0]["severity"], "warning");
    assert_eq!(lines[0]["category"], "system");
    assert_eq!(lines[1]["timestamp"], "2026-05-01T12:00:00+00:00");
}

#[test]
fn console_line_is_plain_text() {
    let line = ConsoleChannel::format_line(&alert("HighCPUUsage", Severity::Warning));
    assert_eq!(
        line,
        "[WARNING] HighCPUUsage (system) 2026-05-01T12:00:00+00:00: cpu.usage is above 85.0 (current 90.0)"
    );
}

#[test]
fn webhook_payload_is_structured() {
    let channel = WebhookChannel::new(&WebhookConfig {
        url: "https://hooks.example.com/T000/B000".to_string(),
        channel: Some("#ops".to_string()),
        username: "hearth".to_string(),
        min_severity: Severity::Info,
    })
    .unwrap();

    let payload = channel.render_payload(&alert("HighCPUUsage", Severity::Critical));
    assert_eq!(payload["channel"], "#ops");
    assert_eq!(payload["username"], "hearth");
    assert_eq!(payload["text"], "[CRITICAL] HighCPUUsage");
    assert_eq!(payload["attachments"][0]["color"], "danger");
    assert_eq!(payload["attachments"][0]["fields"][1]["value"], "system");
}

#[test]
fn webhook_requires_url() {
    let result = WebhookChannel::new(&WebhookConfig {
        url: " ".to_string(),
        channel: None,
        username: "hearth".to_string(),
        min_severity: Severity::Info,
    });
    assert!(matches!(result, Err(NotifyError::InvalidConfig(_))));
}

#[test]
fn email_html_escapes_fields() {
    let mut a = alert("HighDiskUsage", Severity::Warning);
    a.message = "disk.used_percent [mount=/] is <above> 85.0".to_string();
    let html = EmailChannel::render_html(&a);
    assert!(html.contains("&lt;above&gt;"));
    assert!(html.contains("WARNING: HighDiskUsage"));
    assert_eq!(EmailChannel::subject(&a), "[hearth][warning] HighDiskUsage (system)");
}

#[test]
fn email_rejects_bad_addresses() {
    let config = EmailConfig {
        host: "smtp.example.com".to_string(),
        port: 587,
        auth: None,
        from: "not an address".to_string(),
        to: vec!["ops@example.com".to_string()],
        min_severity: Severity::Warning,
    };
    assert!(matches!(EmailChannel::new(&config), Err(NotifyError::InvalidConfig(_))));

    let no_recipients = EmailConfig {
        from: "hearth@example.com".to_string(),
        to: Vec::new(),
        ..config
    };
    assert!(matches!(
        EmailChannel::new(&no_recipients),
        Err(NotifyError::InvalidConfig(_))
    ));
}

#[test]
fn notify_config_defaults() {
    let config: NotifyConfig = toml::from_str(
        r#"
        [file]
        path = "/var/log/hearth/alerts.jsonl"

        [webhook]
        url = "https://hooks.example.com/x"
        min_severity = "critical"
        "#,
    )
    .unwrap();
    assert!(config.console);
    assert_eq!(config.send_timeout_secs, 10);
    assert_eq!(config.history_size, 500);
    assert_eq!(config.webhook.as_ref().unwrap().username, "hearth");
    assert_eq!(config.webhook.unwrap().min_severity, Severity::Critical);
    assert!(config.email.is_none());
}

#[tokio::test]
async fn from_config_builds_enabled_channels() {
    let dir = tempfile::tempdir().unwrap();
    let config = NotifyConfig {
        console: false,
        file: Some(crate::config::FileConfig {
            path: dir.path().join("alerts.jsonl"),
            min_severity: Severity::Info,
        }),
        ..Default::default()
    };
    let dispatcher = AlertDispatcher::from_config(&config).unwrap();
    assert_eq!(dispatcher.channel_names(), vec!["file".to_string()]);

    let report = dispatcher.send(&alert("HighCPUUsage", Severity::Info)).await;
    assert!(report.all_delivered());
}
