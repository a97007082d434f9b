#[derive(Debug, thiserror::Error)]
pub enum SafetyError {
    #[error("Safety: backup {0} not found")]
    BackupNotFound(String),

    #[error("Safety: invalid backup id '{0}'")]
    InvalidBackupId(String),

    #[error("Safety: I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Safety: JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SafetyError>;
