use std::sync::Arc;

use configs::StoreAccess;
use tracing::{debug, info, instrument};

use crate::document::EntryDocument;
use crate::errors::EntryStoreError;
use crate::mutation::{Action, Mutation, MutationOutcome};
use crate::retry::{retry_with_policy, RetryPolicy};
use crate::store::{DocumentStore, WriteRequest};

/// Result of a committed save.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub action: Action,
    pub outcome: MutationOutcome,
    /// Number of entries in the committed document.
    pub entries: usize,
    /// Read-modify-write cycles it took (1 unless retry is enabled).
    pub attempts: u32,
}

/// Applies one mutation to the remote entries document: read, normalize,
/// mutate, write back conditioned on the version token that was read.
pub struct EntryStoreUpdater {
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
    commit_origin: String,
}

impl EntryStoreUpdater {
    pub fn new(store: Arc<dyn DocumentStore>, commit_origin: impl Into<String>) -> Self {
        Self { store, retry: RetryPolicy::disabled(), commit_origin: commit_origin.into() }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run the read-modify-write cycle. A stale version token surfaces as
    /// [`EntryStoreError::UpstreamWrite`]; it is only retried (with a fresh
    /// read) when the retry policy is enabled.
    #[instrument(
        skip(self, access, mutation),
        fields(action = %mutation.action(), id = %mutation.id(), repo = %access.location.repo, path = %access.location.path)
    )]
    pub async fn apply(&self, access: &StoreAccess, mutation: &Mutation) -> Result<SaveOutcome, EntryStoreError> {
        let mut attempts = 0_u32;
        let mut outcome = retry_with_policy(&self.retry, EntryStoreError::is_conflict, || {
            attempts += 1;
            self.apply_once(access, mutation)
        })
        .await?;
        outcome.attempts = attempts;
        info!(
            entries = outcome.entries,
            attempts,
            outcome = ?outcome.outcome,
            "entries document committed"
        );
        Ok(outcome)
    }

    async fn apply_once(&self, access: &StoreAccess, mutation: &Mutation) -> Result<SaveOutcome, EntryStoreError> {
        let current = self
            .store
            .read_document(access)
            .await
            .map_err(EntryStoreError::UpstreamRead)?;

        let mut document = EntryDocument::decode(&current.content);
        let outcome = mutation.apply_to(&mut document);
        debug!(version = %current.version, ?outcome, entries = document.len(), "mutation applied in memory");

        let content = document.encode()?;
        self.store
            .write_document(
                access,
                WriteRequest {
                    content,
                    version: current.version,
                    message: mutation.commit_message(&self.commit_origin),
                },
            )
            .await
            .map_err(EntryStoreError::UpstreamWrite)?;

        Ok(SaveOutcome { action: mutation.action(), outcome, entries: document.len(), attempts: 1 })
    }
}
