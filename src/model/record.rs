//! Schema-free remote records.
//!
//! The upstream API is free to evolve its payloads; the mirror never
//! interprets them beyond identity and recency probing. Records are
//! carried as raw JSON values and written back verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::identity;

/// One remote record, kept as the JSON value the API returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Value);

impl RawRecord {
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Walk a nested object path, e.g. `["session", "session_id"]`.
    #[must_use]
    pub fn probe(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(&self.0, |value, key| value.get(key))
    }

    /// String at `path`, with numbers stringified.
    ///
    /// Whitespace-only strings count as absent, so probing falls
    /// through to the next candidate path.
    #[must_use]
    pub fn probe_string(&self, path: &[&str]) -> Option<String> {
        match self.probe(path)? {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Unsigned integer at `path`, accepting numeric strings.
    ///
    /// Floats truncate; negatives and non-numeric strings count as
    /// absent. Matches how upstream timestamps actually arrive.
    #[must_use]
    pub fn probe_u64(&self, path: &[&str]) -> Option<u64> {
        match self.probe(path)? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<Value> for RawRecord {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

/// The three record families the mirror maintains.
///
/// Each kind carries its own identity strategy, recency source and
/// finalized store ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Conversation,
    Message,
    User,
}

impl RecordKind {
    /// Store name used in paths and log lines.
    #[must_use]
    pub const fn store_name(&self) -> &'static str {
        match self {
            Self::Conversation => "conversations",
            Self::Message => "messages",
            Self::User => "people",
        }
    }

    /// Stable identity of a record, if one can be derived.
    ///
    /// Records without identity cannot be deduplicated and are dropped
    /// with a counted `ignored` outcome.
    #[must_use]
    pub fn identity(&self, record: &RawRecord) -> Option<String> {
        match self {
            Self::Conversation => identity::conversation_identity(record),
            Self::Message => identity::message_identity(record),
            Self::User => identity::user_identity(record),
        }
    }

    /// Recency value used for store ordering, defaulting to 0.
    #[must_use]
    pub fn recency(&self, record: &RawRecord) -> u64 {
        match self {
            Self::Conversation => record.probe_u64(&["active", "last"]).unwrap_or(0),
            // A zero timestamp falls through to created_at, matching
            // how the API fills the two fields.
            Self::Message => record
                .probe_u64(&["timestamp"])
                .filter(|ts| *ts != 0)
                .or_else(|| record.probe_u64(&["created_at"]))
                .unwrap_or(0),
            Self::User => 0,
        }
    }
}
