//! Identity extraction for remote records.
//!
//! Upstream payload shapes drifted across API versions, so each record
//! family probes an ordered list of known paths and takes the first
//! non-empty hit. The lists are ordered most-common-first; extending
//! them is append-only so existing stores keep their identities.

use sha2::{Digest, Sha256};

use crate::model::record::RawRecord;

/// Known locations of a conversation identifier, most common first.
const CONVERSATION_ID_PATHS: &[&[&str]] = &[
    &["session_id"],
    &["session", "session_id"],
    &["id"],
    &["_id"],
    &["conversation_id"],
    &["session", "id"],
    &["conversation", "conversation_id"],
    &["meta", "_id"],
    &["meta", "conversation_id"],
    &["data", "session", "session_id"],
];

/// Known locations of a message identifier.
const MESSAGE_ID_PATHS: &[&[&str]] = &[
    &["fingerprint"],
    &["id"],
    &["uuid"],
    &["created_at"],
    &["timestamp"],
];

/// Known locations of a user email, on both profile records and the
/// conversation records emails are harvested from.
const USER_EMAIL_PATHS: &[&[&str]] = &[&["email"], &["meta", "email"], &["data", "meta", "email"]];

/// Conversation identity: first non-empty id among the known paths.
#[must_use]
pub fn conversation_identity(record: &RawRecord) -> Option<String> {
    CONVERSATION_ID_PATHS
        .iter()
        .find_map(|path| record.probe_string(path))
}

/// Message identity, falling back to a content hash.
///
/// Messages sometimes arrive with no usable id at all; hashing the
/// whole payload still yields a stable dedup key for them.
#[must_use]
pub fn message_identity(record: &RawRecord) -> Option<String> {
    MESSAGE_ID_PATHS
        .iter()
        .find_map(|path| record.probe_string(path))
        .or_else(|| Some(content_hash(record)))
}

/// User identity: normalized email, case-insensitive.
#[must_use]
pub fn user_identity(record: &RawRecord) -> Option<String> {
    USER_EMAIL_PATHS
        .iter()
        .find_map(|path| record.probe_string(path))
        .map(|email| email.trim().to_lowercase())
        .filter(|email| !email.is_empty())
}

/// SHA256 over the record's compact JSON form.
#[must_use]
pub fn content_hash(record: &RawRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record.value().to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}
