use crate::channels::{ConsoleChannel, EmailChannel, FileChannel, WebhookChannel};
use crate::config::NotifyConfig;
use crate::error::{NotifyError, Result};
use crate::routing::ChannelRoute;
use crate::NotificationChannel;
use hearth_collector::buffer::RingBuffer;
use hearth_common::types::{Alert, Severity};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinSet;

/// Per-channel outcome of one [`AlertDispatcher::send`].
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub delivered: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl DispatchReport {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fans fired alerts out to routed channels and keeps a bounded history.
pub struct AlertDispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
    routes: Vec<ChannelRoute>,
    send_timeout: Duration,
    history: Mutex<RingBuffer<Alert>>,
}

impl AlertDispatcher {
    pub fn new(send_timeout: Duration, history_size: usize) -> Self {
        Self {
            channels: Vec::new(),
            routes: Vec::new(),
            send_timeout,
            history: Mutex::new(RingBuffer::new(history_size)),
        }
    }

    /// Builds every channel enabled in `config`.
    pub fn from_config(config: &NotifyConfig) -> Result<Self> {
        let mut dispatcher = Self::new(
            Duration::from_secs(config.send_timeout_secs),
            config.history_size,
        );
        if config.console {
            dispatcher.add_channel(Arc::new(ConsoleChannel::new()), config.console_min_severity);
        }
        if let Some(file) = &config.file {
            dispatcher.add_channel(Arc::new(FileChannel::new(&file.path)), file.min_severity);
        }
        if let Some(email) = &config.email {
            dispatcher.add_channel(Arc::new(EmailChannel::new(email)?), email.min_severity);
        }
        if let Some(webhook) = &config.webhook {
            dispatcher.add_channel(Arc::new(WebhookChannel::new(webhook)?), webhook.min_severity);
        }
        tracing::info!(channels = ?dispatcher.channel_names(), "Alert channels configured");
        Ok(dispatcher)
    }

    pub fn add_channel(&mut self, channel: Arc<dyn NotificationChannel>, min_severity: Severity) {
        self.routes.push(ChannelRoute {
            min_severity,
            channel_index: self.channels.len(),
        });
        self.channels.push(channel);
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels
            .iter()
            .map(|c| c.channel_name().to_string())
            .collect()
    }

    /// Records the alert and delivers it to every channel routed for its
    /// severity. Channels run concurrently, each bounded by the send
    /// timeout; one channel failing never affects another.
    pub async fn send(&self, alert: &Alert) -> DispatchReport {
        self.history
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(alert.clone());

        let mut tasks = JoinSet::new();
        for route in &self.routes {
            if !route.should_send(alert.severity) {
                continue;
            }
            let Some(channel) = self.channels.get(route.channel_index).cloned() else {
                continue;
            };
            let alert = alert.clone();
            let timeout = self.send_timeout;
            tasks.spawn(async move {
                let name = channel.channel_name().to_string();
                let outcome = match tokio::time::timeout(timeout, channel.send(&alert)).await {
                    Ok(result) => result,
                    Err(_) => Err(NotifyError::Timeout {
                        channel: name.clone(),
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                };
                (name, outcome)
            });
        }

        let mut report = DispatchReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(()))) => report.delivered.push(name),
                Ok((name, Err(e))) => {
                    tracing::error!(
                        channel = %name,
                        rule = %alert.rule_name,
                        error = %e,
                        "Failed to send notification"
                    );
                    report.failed.push((name, e.to_string()));
                }
                Err(e) => {
                    tracing::error!(rule = %alert.rule_name, error = %e, "Notification task aborted");
                    report.failed.push(("unknown".to_string(), e.to_string()));
                }
            }
        }
        report
    }

    /// Most recent first, optionally restricted to one severity.
    pub fn history(&self, limit: usize, severity: Option<Severity>) -> Vec<Alert> {
        let history = self.history.lock().unwrap_or_else(|p| p.into_inner());
        history
            .iter()
            .rev()
            .filter(|a| severity.map_or(true, |s| a.severity == s))
            .take(limit)
            .cloned()
            .collect()
    }
}
