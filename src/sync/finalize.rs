//! Store finalization: collapse duplicates, restore canonical order.
//!
//! Append-only runs may leave duplicates from interrupted pages and
//! out-of-order batches. Finalization runs after every sync: load the
//! store, keep the newest copy of each identity, sort, rewrite
//! atomically. Running it twice in a row produces byte-identical
//! output.

use std::cmp::Reverse;
use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::model::{RawRecord, RecordKind};
use crate::store::RecordStore;

/// What finalization did to a store.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FinalizeOutcome {
    /// Records in the finalized store.
    pub total: usize,
    /// Older duplicate copies collapsed away.
    pub collapsed: usize,
    /// Identity-less records dropped.
    pub dropped: usize,
    /// Unparseable lines left behind by the rewrite.
    pub malformed: usize,
}

/// Deduplicate and reorder a store in place.
///
/// Identity collisions resolve last-write-wins in file order: the copy
/// appended most recently carries the freshest payload. Conversations
/// and messages then sort by recency, newest first; user profiles sort
/// by identity so the store diffs stably.
///
/// # Errors
///
/// Returns an error if the store cannot be read or rewritten.
pub fn finalize_store(store: &RecordStore, kind: RecordKind) -> Result<FinalizeOutcome> {
    let loaded = store.load()?;
    let before = loaded.records.len();

    let mut slots: Vec<Option<(String, RawRecord)>> = Vec::with_capacity(before);
    let mut by_identity: HashMap<String, usize> = HashMap::with_capacity(before);
    let mut collapsed = 0usize;
    let mut dropped = 0usize;

    for record in loaded.records {
        let Some(identity) = kind.identity(&record) else {
            dropped += 1;
            continue;
        };
        if let Some(&slot) = by_identity.get(&identity) {
            slots[slot] = Some((identity, record));
            collapsed += 1;
        } else {
            by_identity.insert(identity.clone(), slots.len());
            slots.push(Some((identity, record)));
        }
    }

    let mut entries: Vec<(String, RawRecord)> = slots.into_iter().flatten().collect();
    match kind {
        RecordKind::User => entries.sort_by(|a, b| a.0.cmp(&b.0)),
        RecordKind::Conversation | RecordKind::Message => {
            entries.sort_by_key(|(_, record)| Reverse(kind.recency(record)));
        }
    }

    let records: Vec<RawRecord> = entries.into_iter().map(|(_, record)| record).collect();
    store.rewrite(&records)?;

    debug!(
        store = kind.store_name(),
        total = records.len(),
        collapsed,
        dropped,
        malformed = loaded.malformed,
        "store finalized"
    );

    Ok(FinalizeOutcome {
        total: records.len(),
        collapsed,
        dropped,
        malformed: loaded.malformed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn conversation(id: &str, last: u64, extra: &str) -> RawRecord {
        RawRecord::new(json!({"session_id": id, "active": {"last": last}, "note": extra}))
    }

    #[test]
    fn duplicates_collapse_to_the_latest_copy() {
        let temp_dir = TempDir::new().unwrap();
        let store = RecordStore::new(temp_dir.path().join("conversations.jsonl"));
        store
            .append(&[
                conversation("s_1", 100, "stale"),
                conversation("s_2", 200, "only"),
                conversation("s_1", 300, "fresh"),
            ])
            .unwrap();

        let outcome = finalize_store(&store, RecordKind::Conversation).unwrap();
        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.collapsed, 1);

        let records = store.load().unwrap().records;
        let s1 = records
            .iter()
            .find(|r| r.probe_string(&["session_id"]).as_deref() == Some("s_1"))
            .unwrap();
        assert_eq!(s1.probe_string(&["note"]).as_deref(), Some("fresh"));
    }

    #[test]
    fn conversations_sort_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let store = RecordStore::new(temp_dir.path().join("conversations.jsonl"));
        store
            .append(&[
                conversation("s_old", 100, ""),
                conversation("s_new", 900, ""),
                conversation("s_mid", 500, ""),
            ])
            .unwrap();

        finalize_store(&store, RecordKind::Conversation).unwrap();

        let ids: Vec<_> = store
            .load()
            .unwrap()
            .records
            .iter()
            .map(|r| r.probe_string(&["session_id"]).unwrap())
            .collect();
        assert_eq!(ids, vec!["s_new", "s_mid", "s_old"]);
    }

    #[test]
    fn equal_recency_keeps_file_order() {
        let temp_dir = TempDir::new().unwrap();
        let store = RecordStore::new(temp_dir.path().join("conversations.jsonl"));
        store
            .append(&[
                conversation("s_a", 500, ""),
                conversation("s_b", 500, ""),
                conversation("s_top", 900, ""),
            ])
            .unwrap();

        finalize_store(&store, RecordKind::Conversation).unwrap();

        let ids: Vec<_> = store
            .load()
            .unwrap()
            .records
            .iter()
            .map(|r| r.probe_string(&["session_id"]).unwrap())
            .collect();
        assert_eq!(ids, vec!["s_top", "s_a", "s_b"]);
    }

    #[test]
    fn people_sort_by_email() {
        let temp_dir = TempDir::new().unwrap();
        let store = RecordStore::new(temp_dir.path().join("people.jsonl"));
        store
            .append(&[
                RawRecord::new(json!({"email": "zoe@example.com"})),
                RawRecord::new(json!({"email": "ada@example.com"})),
                RawRecord::new(json!({"email": "mia@example.com"})),
            ])
            .unwrap();

        finalize_store(&store, RecordKind::User).unwrap();

        let emails: Vec<_> = store
            .load()
            .unwrap()
            .records
            .iter()
            .map(|r| r.probe_string(&["email"]).unwrap())
            .collect();
        assert_eq!(
            emails,
            vec!["ada@example.com", "mia@example.com", "zoe@example.com"]
        );
    }

    #[test]
    fn identity_less_and_unparseable_lines_are_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conversations.jsonl");
        fs::write(
            &path,
            concat!(
                "{\"session_id\": \"s_1\", \"active\": {\"last\": 10}}\n",
                "{\"no_identity\": true}\n",
                "this line is not json\n",
            ),
        )
        .unwrap();

        let store = RecordStore::new(&path);
        let outcome = finalize_store(&store, RecordKind::Conversation).unwrap();
        assert_eq!(outcome.total, 1);
        assert_eq!(outcome.dropped, 1);
        assert_eq!(outcome.malformed, 1);
        assert_eq!(store.line_count().unwrap(), 1);
    }

    #[test]
    fn finalizing_twice_is_byte_identical() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("messages.jsonl");
        let store = RecordStore::new(&path);
        store
            .append(&[
                RawRecord::new(json!({"fingerprint": "f_2", "timestamp": 200})),
                RawRecord::new(json!({"fingerprint": "f_1", "timestamp": 100})),
                RawRecord::new(json!({"fingerprint": "f_2", "timestamp": 250})),
            ])
            .unwrap();

        finalize_store(&store, RecordKind::Message).unwrap();
        let first = fs::read(&path).unwrap();
        finalize_store(&store, RecordKind::Message).unwrap();
        let second = fs::read(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_store_finalizes_to_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = RecordStore::new(temp_dir.path().join("people.jsonl"));
        let outcome = finalize_store(&store, RecordKind::User).unwrap();
        assert_eq!(outcome.total, 0);
        assert_eq!(store.line_count().unwrap(), 0);
    }
}
