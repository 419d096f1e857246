//! Remote document store abstraction.
//!
//! The updater only needs two calls: read the current bytes with their
//! version token, and write new bytes conditioned on that token.

use std::fmt;

use async_trait::async_trait;
use configs::StoreAccess;
use thiserror::Error;

pub mod github;
pub mod memory;

pub use github::GithubStore;
pub use memory::MemoryStore;

pub const STATUS_CONFLICT: u16 = 409;

/// Opaque handle of one revision of the stored document (GitHub blob sha).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Current content of the document, already stripped of transport encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub content: Vec<u8>,
    pub version: VersionToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub content: Vec<u8>,
    pub version: VersionToken,
    pub message: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store answered with a non-success status; `body` is its text.
    #[error("{body}")]
    Rejected { status: u16, body: String },
    /// Network failure or timeout.
    #[error("{0}")]
    Transport(String),
    /// The store answered but the payload could not be used.
    #[error("{0}")]
    Format(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Rejected { status, .. } if *status == STATUS_CONFLICT)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            StoreError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read_document(&self, access: &StoreAccess) -> Result<StoredDocument, StoreError>;
    async fn write_document(&self, access: &StoreAccess, request: WriteRequest) -> Result<(), StoreError>;
}
