use crate::config::WebhookConfig;
use crate::error::{NotifyError, Result};
use crate::utils::{truncate_string, MAX_BODY_LENGTH};
use crate::NotificationChannel;
use async_trait::async_trait;
use hearth_common::types::{Alert, Severity};
use serde_json::{json, Value};

/// Posts a chat-style payload (`channel`, `username`, `text`, `attachments`)
/// to an incoming-webhook URL.
pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
    channel: Option<String>,
    username: String,
}

impl WebhookChannel {
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(NotifyError::InvalidConfig("webhook url is empty".to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            url: config.url.clone(),
            channel: config.channel.clone(),
            username: config.username.clone(),
        })
    }

    pub fn render_payload(&self, alert: &Alert) -> Value {
        let color = match alert.severity {
            Severity::Critical => "danger",
            Severity::Warning => "warning",
            Severity::Info => "good",
        };
        let mut payload = json!({
            "username": self.username,
            "text": format!("[{}] {}", alert.severity.to_string().to_uppercase(), alert.rule_name),
            "attachments": [{
                "color": color,
                "title": alert.rule_name,
                "text": alert.message,
                "fields": [
                    { "title": "Severity", "value": alert.severity.to_string(), "short": true },
                    { "title": "Category", "value": alert.category, "short": true },
                    { "title": "Time", "value": alert.timestamp.to_rfc3339(), "short": false },
                ],
                "ts": alert.timestamp.timestamp(),
            }],
        });
        if let (Some(channel), Some(obj)) = (&self.channel, payload.as_object_mut()) {
            obj.insert("channel".to_string(), Value::String(channel.clone()));
        }
        payload
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(&self.render_payload(alert))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = match resp.text().await {
                Ok(text) => truncate_string(&text, MAX_BODY_LENGTH),
                Err(e) => format!("[Failed to read response body: {e}]"),
            };
            return Err(NotifyError::ApiError {
                service: "webhook".to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}
