use crate::error::Result;
use crate::NotificationChannel;
use async_trait::async_trait;
use hearth_common::types::Alert;
use tokio::io::AsyncWriteExt;

/// Writes one plain-text line per alert to stdout.
#[derive(Default)]
pub struct ConsoleChannel;

impl ConsoleChannel {
    pub fn new() -> Self {
        Self
    }

    pub fn format_line(alert: &Alert) -> String {
        format!(
            "[{severity}] {rule} ({category}) {time}: {message}",
            severity = alert.severity.to_string().to_uppercase(),
            rule = alert.rule_name,
            category = alert.category,
            time = alert.timestamp.to_rfc3339(),
            message = alert.message,
        )
    }
}

#[async_trait]
impl NotificationChannel for ConsoleChannel {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let mut line = Self::format_line(alert);
        line.push('\n');
        let mut stdout = tokio::io::stdout();
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "console"
    }
}
