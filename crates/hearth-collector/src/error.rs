/// A metric source failed for one tick. The sampler logs it and keeps going.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CollectError {
    #[error("Collect: collector '{collector}' failed: {message}")]
    SourceFailed { collector: String, message: String },

    #[error("Collect: collector '{collector}' panicked")]
    Panicked { collector: String },

    #[error("Collect: sampling did not finish within {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },
}

impl CollectError {
    pub fn collector(&self) -> Option<&str> {
        match self {
            Self::SourceFailed { collector, .. } | Self::Panicked { collector } => Some(collector),
            Self::TimedOut { .. } => None,
        }
    }
}
