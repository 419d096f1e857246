//! Typed mutations and the request schema they are parsed from.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::{EntryDocument, UpsertOutcome};
use crate::errors::EntryStoreError;

pub const MISSING_ENTRY: &str = "Missing entry or entry.id";
pub const MISSING_DELETE_ID: &str = "Missing id for delete";
pub const INVALID_BODY: &str = "Invalid JSON body";

/// Identifier of an entry: a non-empty string or a number.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryId(Value);

impl EntryId {
    /// `None` for null, empty strings, booleans, arrays and objects.
    pub fn try_from_value(value: Value) -> Option<Self> {
        match &value {
            Value::String(s) if !s.is_empty() => Some(Self(value)),
            Value::Number(_) => Some(Self(value)),
            _ => None,
        }
    }

    /// Whether a stored element carries this id. Non-objects never match.
    pub fn matches(&self, stored: &Value) -> bool {
        stored.get("id").is_some_and(|other| same_id(&self.0, other))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Strings compare by content, numbers by value (`1` and `1.0` are the same
/// id); a string never equals a number.
fn same_id(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return x == y;
            }
            if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                return x == y;
            }
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (Value::String(x), Value::String(y)) => x == y,
        _ => false,
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

/// An entry as supplied by the caller. Fields other than `id` are opaque.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    id: EntryId,
    fields: Map<String, Value>,
}

impl Entry {
    /// `None` unless `value` is an object with a usable `id`.
    pub fn try_from_value(value: Value) -> Option<Self> {
        let Value::Object(fields) = value else { return None };
        let id = fields.get("id").cloned().and_then(EntryId::try_from_value)?;
        Some(Self { id, fields })
    }

    pub fn id(&self) -> &EntryId {
        &self.id
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Upsert,
    Delete,
}

impl Action {
    /// `"delete"` selects delete; anything else, including no action, is an upsert.
    pub fn from_request(raw: Option<&Value>) -> Self {
        match raw {
            Some(Value::String(s)) if s == "delete" => Action::Delete,
            _ => Action::Upsert,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Upsert => "upsert",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Upsert(Entry),
    Delete(EntryId),
}

/// Effect of applying a mutation to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Upserted(UpsertOutcome),
    Deleted { removed: usize },
}

impl Mutation {
    pub fn action(&self) -> Action {
        match self {
            Mutation::Upsert(_) => Action::Upsert,
            Mutation::Delete(_) => Action::Delete,
        }
    }

    pub fn id(&self) -> &EntryId {
        match self {
            Mutation::Upsert(entry) => entry.id(),
            Mutation::Delete(id) => id,
        }
    }

    pub fn apply_to(&self, document: &mut EntryDocument) -> MutationOutcome {
        match self {
            Mutation::Upsert(entry) => MutationOutcome::Upserted(document.upsert(entry.clone())),
            Mutation::Delete(id) => MutationOutcome::Deleted { removed: document.remove(id) },
        }
    }

    pub fn commit_message(&self, origin: &str) -> String {
        let verb = match self {
            Mutation::Upsert(_) => "Upsert",
            Mutation::Delete(_) => "Delete",
        };
        format!("{verb} entry {} via {origin}", self.id())
    }
}

/// Body of a save request. Fields stay untyped until [`into_mutation`](Self::into_mutation).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveEntryRequest {
    #[serde(default)]
    pub action: Option<Value>,
    #[serde(default)]
    pub entry: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

impl SaveEntryRequest {
    /// Parse a raw body. An empty body or a JSON value that is not an object
    /// is an empty request.
    pub fn from_body(body: &[u8]) -> Result<Self, EntryStoreError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_slice(body)
            .map_err(|_| EntryStoreError::Validation(INVALID_BODY.into()))?;
        match value {
            Value::Object(_) => serde_json::from_value(value)
                .map_err(|_| EntryStoreError::Validation(INVALID_BODY.into())),
            _ => Ok(Self::default()),
        }
    }

    pub fn action(&self) -> Action {
        Action::from_request(self.action.as_ref())
    }

    pub fn into_mutation(self) -> Result<Mutation, EntryStoreError> {
        match self.action() {
            Action::Upsert => self
                .entry
                .and_then(Entry::try_from_value)
                .map(Mutation::Upsert)
                .ok_or_else(|| EntryStoreError::Validation(MISSING_ENTRY.into())),
            Action::Delete => self
                .id
                .and_then(EntryId::try_from_value)
                .map(Mutation::Delete)
                .ok_or_else(|| EntryStoreError::Validation(MISSING_DELETE_ID.into())),
        }
    }
}
