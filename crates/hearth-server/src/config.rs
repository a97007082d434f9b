use hearth_alert::defaults::Thresholds;
use hearth_alert::rules::RuleSpec;
use hearth_alert::suppression::SuppressionPolicy;
use hearth_notify::config::{NotifyConfig, WebhookConfig};
use hearth_safety::SafetyConfig;
use hearth_storage::StorageConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Whole-process configuration, one section per subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HearthConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub alert: AlertConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub business: BusinessConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Time allowed for queues to drain on shutdown before tasks are aborted.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Directive added on top of `RUST_LOG`.
    #[serde(default = "default_log_directive")]
    pub directive: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            directive: default_log_directive(),
        }
    }
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

fn default_log_directive() -> String {
    "hearth=info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Samples retained per series.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Register the cpu/memory/disk/network/load collectors.
    #[serde(default = "default_true")]
    pub system_collectors: bool,
    #[serde(default = "default_link_speed_mbps")]
    pub link_speed_mbps: f64,
    /// Upper bound for one sampling pass.
    #[serde(default = "default_sample_timeout_secs")]
    pub sample_timeout_secs: u64,
    /// Submitted samples buffered between ticks.
    #[serde(default = "default_ingest_queue_size")]
    pub queue_size: usize,
    /// Observations kept per instrumentation window.
    #[serde(default = "default_instrument_window")]
    pub instrument_window: usize,
    #[serde(default = "default_slow_query_ms")]
    pub slow_query_ms: f64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            buffer_capacity: default_buffer_capacity(),
            system_collectors: true,
            link_speed_mbps: default_link_speed_mbps(),
            sample_timeout_secs: default_sample_timeout_secs(),
            queue_size: default_ingest_queue_size(),
            instrument_window: default_instrument_window(),
            slow_query_ms: default_slow_query_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    5
}

fn default_buffer_capacity() -> usize {
    hearth_collector::buffer::DEFAULT_CAPACITY
}

fn default_link_speed_mbps() -> f64 {
    hearth_collector::network::DEFAULT_LINK_SPEED_MBPS
}

fn default_sample_timeout_secs() -> u64 {
    3
}

fn default_ingest_queue_size() -> usize {
    4096
}

fn default_instrument_window() -> usize {
    hearth_collector::instrument::stats::DEFAULT_WINDOW
}

fn default_slow_query_ms() -> f64 {
    hearth_collector::instrument::db::DEFAULT_SLOW_QUERY_MS
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default)]
    pub suppression: SuppressionPolicy,
    #[serde(default)]
    pub thresholds: Thresholds,
    /// Extra threshold rules registered after the built-in set.
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusinessConfig {
    /// UTC hour at which daily counters are summarised and reset.
    #[serde(default)]
    pub daily_reset_hour: u32,
}

impl HearthConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Loads `path` when it exists, otherwise starts from defaults.
    pub fn load_or_default(path: &str) -> anyhow::Result<Self> {
        if Path::new(path).exists() {
            return Self::load(path);
        }
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies `HEARTH_*` overrides. `lookup` abstracts the environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(v) = lookup("HEARTH_HTTP_PORT") {
            self.server.http_port = v.parse()?;
        }
        if let Some(v) = lookup("HEARTH_SAMPLE_INTERVAL_SECS") {
            self.collector.interval_secs = v.parse()?;
        }
        if let Some(v) = lookup("HEARTH_STORAGE_BACKEND") {
            self.storage.backend = v.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(v) = lookup("HEARTH_DATABASE_URL") {
            self.storage.database_url = v;
        }
        if let Some(v) = lookup("HEARTH_SQLITE_PATH") {
            self.storage.sqlite_path = v.into();
        }
        if let Some(v) = lookup("HEARTH_WEBHOOK_URL") {
            match self.notify.webhook.as_mut() {
                Some(webhook) => webhook.url = v,
                None => self.notify.webhook = Some(WebhookConfig::new(v)),
            }
        }
        if let Some(v) = lookup("HEARTH_SMTP_PASSWORD") {
            if let Some(auth) = self.notify.email.as_mut().and_then(|e| e.auth.as_mut()) {
                auth.password = v;
            }
        }
        if let Some(v) = lookup("HEARTH_LOG_FORMAT") {
            self.logging.format = match v.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                other => anyhow::bail!("unknown log format: {other}"),
            };
        }
        Ok(())
    }
}
