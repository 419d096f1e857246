use thiserror::Error;

use crate::store::StoreError;

/// Failures of one save request, from configuration to the final write.
#[derive(Debug, Error)]
pub enum EntryStoreError {
    #[error("Missing GitHub configuration")]
    MissingConfiguration(#[from] configs::ConfigError),
    #[error("{0}")]
    Validation(String),
    #[error("Error reading file from GitHub: {0}")]
    UpstreamRead(StoreError),
    #[error("Error writing file to GitHub: {0}")]
    UpstreamWrite(StoreError),
    #[error("Server error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl EntryStoreError {
    /// A write rejected because the version token was stale.
    pub fn is_conflict(&self) -> bool {
        matches!(self, EntryStoreError::UpstreamWrite(e) if e.is_conflict())
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EntryStoreError::MissingConfiguration(_) => "missing_configuration",
            EntryStoreError::Validation(_) => "validation",
            EntryStoreError::UpstreamRead(_) => "upstream_read",
            EntryStoreError::UpstreamWrite(e) if e.is_conflict() => "conflict",
            EntryStoreError::UpstreamWrite(_) => "upstream_write",
            EntryStoreError::Encode(_) => "encode",
        }
    }
}
