//! The entries document as stored in the remote repository.
//!
//! Decoding is lenient: whatever the stored bytes contain, the result is a
//! document whose `entries` is a sequence. Other top-level fields survive a
//! decode/encode cycle unchanged and in place.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use tracing::warn;

use crate::mutation::{Entry, EntryId};

pub const ENTRIES_KEY: &str = "entries";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryDocument {
    /// Top-level fields other than `entries`. When the stored object had an
    /// `entries` key its slot is kept here (value ignored) so the key keeps
    /// its position on encode.
    fields: Map<String, Value>,
    entries: Vec<Value>,
}

/// What an upsert did to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted { index: usize },
    Replaced { index: usize },
}

impl EntryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode stored bytes. Invalid UTF-8 or invalid JSON yields an empty
    /// document.
    pub fn decode(bytes: &[u8]) -> Self {
        let text = match std::str::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "stored document is not valid utf-8; starting from an empty document");
                return Self::new();
            }
        };
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::from_value(value),
            Err(e) => {
                if !text.trim().is_empty() {
                    warn!(error = %e, "stored document is not valid json; starting from an empty document");
                }
                Self::new()
            }
        }
    }

    /// Normalize any JSON value into a document.
    /// - bare array → its elements become `entries`
    /// - object → `entries` kept if it is an array, otherwise emptied
    /// - anything else → empty document
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(entries) => Self { fields: Map::new(), entries },
            Value::Object(mut fields) => {
                let entries = match fields.get_mut(ENTRIES_KEY).map(Value::take) {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                };
                Self { fields, entries }
            }
            _ => Self::new(),
        }
    }

    pub fn entries(&self) -> &[Value] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-level value other than `entries`.
    pub fn field(&self, key: &str) -> Option<&Value> {
        if key == ENTRIES_KEY {
            return None;
        }
        self.fields.get(key)
    }

    /// Position of the first entry carrying `id`.
    pub fn position(&self, id: &EntryId) -> Option<usize> {
        self.entries.iter().position(|e| id.matches(e))
    }

    /// Replace the first entry with the same id in place, or append.
    pub fn upsert(&mut self, entry: Entry) -> UpsertOutcome {
        match self.position(entry.id()) {
            Some(index) => {
                self.entries[index] = entry.into_value();
                UpsertOutcome::Replaced { index }
            }
            None => {
                self.entries.push(entry.into_value());
                UpsertOutcome::Inserted { index: self.entries.len() - 1 }
            }
        }
    }

    /// Remove every entry carrying `id`; returns how many were removed.
    pub fn remove(&mut self, id: &EntryId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !id.matches(e));
        before - self.entries.len()
    }

    /// Pretty-printed JSON (two-space indent).
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut out = serde_json::to_vec_pretty(self)?;
        out.push(b'\n');
        Ok(out)
    }

    pub fn to_value(&self) -> Value {
        let mut root = self.fields.clone();
        root.insert(ENTRIES_KEY.to_string(), Value::Array(self.entries.clone()));
        Value::Object(root)
    }
}

impl Serialize for EntryDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let has_slot = self.fields.contains_key(ENTRIES_KEY);
        let len = self.fields.len() + usize::from(!has_slot);
        let mut map = serializer.serialize_map(Some(len))?;
        for (key, value) in &self.fields {
            if key == ENTRIES_KEY {
                map.serialize_entry(key, &self.entries)?;
            } else {
                map.serialize_entry(key, value)?;
            }
        }
        if !has_slot {
            map.serialize_entry(ENTRIES_KEY, &self.entries)?;
        }
        map.end()
    }
}
