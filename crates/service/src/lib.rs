//! Service layer for the entries document.
//! - `document`: lenient decoding and normalization of the stored JSON.
//! - `mutation`: request schema and typed upsert/delete mutations.
//! - `store`: the remote store seam, with GitHub and in-memory backends.
//! - `updater`: the read-modify-write cycle tying them together.

pub mod document;
pub mod errors;
pub mod mutation;
pub mod retry;
pub mod store;
pub mod updater;

pub use document::EntryDocument;
pub use errors::EntryStoreError;
pub use mutation::{Action, Entry, EntryId, Mutation, SaveEntryRequest};
pub use updater::{EntryStoreUpdater, SaveOutcome};
