use crate::error::Result;
use crate::NotificationChannel;
use async_trait::async_trait;
use hearth_common::types::Alert;
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Appends one JSON object per alert to a file.
pub struct FileChannel {
    path: PathBuf,
    // Serialises appends so concurrent alerts never interleave lines.
    write_lock: Mutex<()>,
}

impl FileChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format_line(alert: &Alert) -> Result<String> {
        let line = serde_json::to_string(&json!({
            "id": alert.id,
            "severity": alert.severity,
            "rule_name": alert.rule_name,
            "category": alert.category,
            "message": alert.message,
            "timestamp": alert.timestamp.to_rfc3339(),
            "metrics": alert.metrics_snapshot,
        }))?;
        Ok(line)
    }
}

#[async_trait]
impl NotificationChannel for FileChannel {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let mut line = Self::format_line(alert)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "file"
    }
}
