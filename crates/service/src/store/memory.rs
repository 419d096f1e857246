//! In-process store with the same optimistic-concurrency contract as the
//! contents API. Used by tests and local runs without GitHub access.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use configs::StoreAccess;
use serde_json::Value;

use super::{DocumentStore, StoreError, StoredDocument, VersionToken, WriteRequest, STATUS_CONFLICT};

#[derive(Default)]
struct State {
    content: Vec<u8>,
    revision: u64,
    reads: usize,
    writes: Vec<WriteRequest>,
    fail_next_read: Option<StoreError>,
    fail_next_write: Option<StoreError>,
    // content committed by "someone else" right after the next read
    interleaved_write: Option<Vec<u8>>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn version_of(revision: u64) -> VersionToken {
    VersionToken::new(format!("rev-{revision}"))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(content: impl Into<Vec<u8>>) -> Self {
        let store = Self::new();
        store.lock().content = content.into();
        store
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn content(&self) -> Vec<u8> {
        self.lock().content.clone()
    }

    /// Current content parsed as JSON, if it parses.
    pub fn content_json(&self) -> Option<Value> {
        serde_json::from_slice(&self.lock().content).ok()
    }

    pub fn version(&self) -> VersionToken {
        version_of(self.lock().revision)
    }

    pub fn read_count(&self) -> usize {
        self.lock().reads
    }

    /// Accepted writes, oldest first.
    pub fn writes(&self) -> Vec<WriteRequest> {
        self.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    pub fn fail_next_read(&self, error: StoreError) {
        self.lock().fail_next_read = Some(error);
    }

    pub fn fail_next_write(&self, error: StoreError) {
        self.lock().fail_next_write = Some(error);
    }

    /// Simulate a concurrent writer: right after the next read is served,
    /// `content` is committed and the version moves on, so the reader's
    /// token goes stale.
    pub fn interleave_write_after_next_read(&self, content: impl Into<Vec<u8>>) {
        self.lock().interleaved_write = Some(content.into());
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read_document(&self, _access: &StoreAccess) -> Result<StoredDocument, StoreError> {
        let mut state = self.lock();
        state.reads += 1;
        if let Some(err) = state.fail_next_read.take() {
            return Err(err);
        }
        let doc = StoredDocument { content: state.content.clone(), version: version_of(state.revision) };
        if let Some(other) = state.interleaved_write.take() {
            state.content = other;
            state.revision += 1;
        }
        Ok(doc)
    }

    async fn write_document(&self, _access: &StoreAccess, request: WriteRequest) -> Result<(), StoreError> {
        let mut state = self.lock();
        if let Some(err) = state.fail_next_write.take() {
            return Err(err);
        }
        let current = version_of(state.revision);
        if request.version != current {
            return Err(StoreError::Rejected {
                status: STATUS_CONFLICT,
                body: format!(
                    r#"{{"message":"document is at {} but expected {}"}}"#,
                    current, request.version
                ),
            });
        }
        state.content = request.content.clone();
        state.revision += 1;
        state.writes.push(request);
        Ok(())
    }
}
