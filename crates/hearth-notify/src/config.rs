use hearth_common::types::Severity;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_true() -> bool {
    true
}

fn default_min_severity() -> Severity {
    Severity::Info
}

fn default_send_timeout_secs() -> u64 {
    10
}

fn default_history_size() -> usize {
    500
}

fn default_smtp_port() -> u16 {
    587
}

fn default_webhook_username() -> String {
    "hearth".to_string()
}

/// `[notify]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_true")]
    pub console: bool,
    #[serde(default = "default_min_severity")]
    pub console_min_severity: Severity,
    #[serde(default)]
    pub file: Option<FileConfig>,
    #[serde(default)]
    pub email: Option<EmailConfig>,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
    /// Upper bound for one channel delivering one alert.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
    /// Alerts kept in memory for the history query.
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            console: true,
            console_min_severity: default_min_severity(),
            file: None,
            email: None,
            webhook: None,
            send_timeout_secs: default_send_timeout_secs(),
            history_size: default_history_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub path: PathBuf,
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpAuth {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub auth: Option<SmtpAuth>,
    pub from: String,
    pub to: Vec<String>,
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default = "default_webhook_username")]
    pub username: String,
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,
}

impl WebhookConfig {
    /// Webhook with default username and routing.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            channel: None,
            username: default_webhook_username(),
            min_severity: default_min_severity(),
        }
    }
}
