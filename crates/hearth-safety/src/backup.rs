//! Durable JSON snapshots for manual recovery.
//!
//! Each backup is one `backup-<id>.json` file in the backup directory,
//! written to a temporary name and renamed into place. Pruning runs only
//! after a write succeeded, so the newest backup always exists before older
//! ones are removed.

use crate::error::{Result, SafetyError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backup {
    pub id: String,
    pub component: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub payload: serde_json::Value,
}

/// Listing entry; the payload stays on disk.
#[derive(Debug, Clone, Serialize)]
pub struct BackupInfo {
    pub id: String,
    pub component: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: serde_json::Value,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
    max_backups: usize,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>, max_backups: usize) -> Self {
        Self {
            dir: dir.into(),
            max_backups: max_backups.max(1),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SafetyError::InvalidBackupId(id.to_string()));
        }
        Ok(self.dir.join(format!("backup-{id}.json")))
    }

    pub async fn create(
        &self,
        component: &str,
        payload: serde_json::Value,
        metadata: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<BackupInfo> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let backup = Backup {
            id: hearth_common::id::next_id(),
            component: component.to_string(),
            timestamp: now,
            metadata,
            payload,
        };
        let bytes = serde_json::to_vec_pretty(&backup)?;
        let path = self.path_for(&backup.id)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::info!(id = %backup.id, component, path = %path.display(), "Backup written");

        if let Err(e) = self.prune().await {
            tracing::warn!(error = %e, "Backup pruning failed");
        }

        Ok(BackupInfo {
            id: backup.id,
            component: backup.component,
            timestamp: backup.timestamp,
            metadata: backup.metadata,
            size_bytes: bytes.len() as u64,
        })
    }

    /// Newest first. Unreadable files are skipped.
    pub async fn list(&self) -> Result<Vec<BackupInfo>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !(name.starts_with("backup-") && name.ends_with(".json")) {
                continue;
            }
            let bytes = match tokio::fs::read(entry.path()).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "Skipping unreadable backup");
                    continue;
                }
            };
            match serde_json::from_slice::<Backup>(&bytes) {
                Ok(backup) => out.push(BackupInfo {
                    id: backup.id,
                    component: backup.component,
                    timestamp: backup.timestamp,
                    metadata: backup.metadata,
                    size_bytes: bytes.len() as u64,
                }),
                Err(e) => tracing::warn!(file = %name, error = %e, "Skipping malformed backup"),
            }
        }
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        Ok(out)
    }

    pub async fn restore(&self, id: &str) -> Result<Backup> {
        let path = self.path_for(id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SafetyError::BackupNotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let backup: Backup = serde_json::from_slice(&bytes)?;
        tracing::info!(id, component = %backup.component, "Backup restored");
        Ok(backup)
    }

    /// Deletes backups beyond `max_backups`, oldest first. Returns the number
    /// removed.
    pub async fn prune(&self) -> Result<usize> {
        let backups = self.list().await?;
        let mut removed = 0;
        for stale in backups.iter().skip(self.max_backups) {
            let path = self.path_for(&stale.id)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        if removed > 0 {
            tracing::info!(removed, kept = self.max_backups, "Pruned old backups");
        }
        Ok(removed)
    }
}
