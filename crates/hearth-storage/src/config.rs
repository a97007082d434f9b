use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Single SQLite file via rusqlite.
    Embedded,
    /// SeaORM connection URL (`postgres://` or `sqlite://`).
    Relational,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "embedded" | "sqlite" => Ok(Self::Embedded),
            "relational" | "postgres" => Ok(Self::Relational),
            _ => Err(format!("unknown storage backend: {s}")),
        }
    }
}

fn default_backend() -> StorageBackend {
    StorageBackend::Embedded
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("data/hearth.db")
}

fn default_database_url() -> String {
    "sqlite://data/hearth-relational.db?mode=rwc".to_string()
}

fn default_retention_days() -> u32 {
    30
}

fn default_write_timeout_ms() -> u64 {
    2000
}

fn default_queue_size() -> usize {
    1024
}

fn default_aggregation_interval_secs() -> u64 {
    3600
}

fn default_cleanup_interval_secs() -> u64 {
    86400
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    #[serde(default = "default_aggregation_interval_secs")]
    pub aggregation_interval_secs: u64,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            sqlite_path: default_sqlite_path(),
            database_url: default_database_url(),
            retention_days: default_retention_days(),
            write_timeout_ms: default_write_timeout_ms(),
            queue_size: default_queue_size(),
            aggregation_interval_secs: default_aggregation_interval_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}
