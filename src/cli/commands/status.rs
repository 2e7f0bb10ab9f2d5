//! `cm status` - inspect the local archive without touching the API.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use crate::config::DataDir;
use crate::error::Result;
use crate::store::{RecordStore, StateFile};
use crate::sync::CursorValue;

use super::format_size;

#[derive(Debug, Serialize)]
struct ArchiveStatus {
    data_dir: String,
    conversations: StoreStatus,
    messages: MessagesStatus,
    people: StoreStatus,
}

#[derive(Debug, Serialize)]
struct StoreStatus {
    records: usize,
    malformed: usize,
    size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<CursorValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct MessagesStatus {
    stores: usize,
    records: usize,
    malformed: usize,
    size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    walk_position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

pub fn execute(data_dir: Option<&Path>, json: bool) -> Result<()> {
    let data = DataDir::resolve(data_dir)?;
    let status = gather(&data)?;

    if json {
        println!("{}", serde_json::to_string(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}

fn gather(data: &DataDir) -> Result<ArchiveStatus> {
    let conversations = store_status(
        &RecordStore::new(data.conversations_store()),
        StateFile::new(data.conversations_state()).load(),
    )?;
    let people = store_status(&RecordStore::new(data.people_store()), None)?;

    let mut messages = MessagesStatus {
        stores: 0,
        records: 0,
        malformed: 0,
        size_bytes: 0,
        walk_position: None,
        updated_at: None,
    };
    if data.messages_dir().is_dir() {
        for entry in fs::read_dir(data.messages_dir())? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
                let store = RecordStore::new(&path);
                let loaded = store.load()?;
                messages.stores += 1;
                messages.records += loaded.records.len();
                messages.malformed += loaded.malformed;
                messages.size_bytes += store.size_bytes();
            }
        }
    }
    if let Some(state) = StateFile::new(data.messages_state()).load() {
        if let CursorValue::Index(position) = state.cursor {
            messages.walk_position = Some(position);
        }
        messages.updated_at = Some(state.updated_at);
    }

    Ok(ArchiveStatus {
        data_dir: data.root().display().to_string(),
        conversations,
        messages,
        people,
    })
}

fn store_status(store: &RecordStore, state: Option<crate::store::SyncState>) -> Result<StoreStatus> {
    let loaded = store.load()?;
    Ok(StoreStatus {
        records: loaded.records.len(),
        malformed: loaded.malformed,
        size_bytes: store.size_bytes(),
        cursor: state.as_ref().map(|s| s.cursor),
        updated_at: state.as_ref().map(|s| s.updated_at),
    })
}

fn print_status(status: &ArchiveStatus) {
    println!("{}", "Archive Status".bold().underline());
    println!();
    println!("  Location: {}", status.data_dir);
    println!();

    if status.conversations.size_bytes == 0
        && status.messages.size_bytes == 0
        && status.people.size_bytes == 0
    {
        println!("{}", "Archive is empty.".dimmed());
        println!("{}", "Run 'cm conversations' to start mirroring.".dimmed());
        return;
    }

    println!("{}", "Conversations:".blue().bold());
    println!(
        "  Records: {} ({})",
        status.conversations.records,
        format_size(status.conversations.size_bytes)
    );
    print_malformed(status.conversations.malformed);
    match (&status.conversations.cursor, &status.conversations.updated_at) {
        (Some(cursor), Some(at)) => println!(
            "  Cursor:  {} (saved {})",
            cursor.describe(),
            at.format("%Y-%m-%d %H:%M UTC")
        ),
        _ => println!("  {}", "Never synced.".dimmed()),
    }
    println!();

    println!("{}", "Messages:".blue().bold());
    println!(
        "  Records: {} across {} conversations ({})",
        status.messages.records,
        status.messages.stores,
        format_size(status.messages.size_bytes)
    );
    print_malformed(status.messages.malformed);
    match (status.messages.walk_position, &status.messages.updated_at) {
        (Some(position), Some(at)) => println!(
            "  Walk:    at {} of {} conversations (saved {})",
            position,
            status.conversations.records,
            at.format("%Y-%m-%d %H:%M UTC")
        ),
        _ => println!("  {}", "Never synced.".dimmed()),
    }
    println!();

    println!("{}", "People:".blue().bold());
    println!(
        "  Records: {} ({})",
        status.people.records,
        format_size(status.people.size_bytes)
    );
    print_malformed(status.people.malformed);
}

fn print_malformed(count: usize) {
    if count > 0 {
        println!(
            "  {}",
            format!("{count} unreadable lines, dropped at next finalization").yellow()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawRecord;
    use crate::store::SyncState;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn gather_on_empty_dir_is_all_zeroes() {
        let tmp = TempDir::new().unwrap();
        let status = gather(&DataDir::new(tmp.path())).unwrap();

        assert_eq!(status.conversations.records, 0);
        assert_eq!(status.conversations.malformed, 0);
        assert_eq!(status.messages.stores, 0);
        assert_eq!(status.people.records, 0);
        assert!(status.conversations.cursor.is_none());
    }

    fn scribble(path: &Path) {
        let mut content = fs::read_to_string(path).unwrap();
        content.push_str("not json\n");
        fs::write(path, content).unwrap();
    }

    #[test]
    fn gather_counts_stores_and_reads_cursors() {
        let tmp = TempDir::new().unwrap();
        let data = DataDir::new(tmp.path());

        let conversations = RecordStore::new(data.conversations_store());
        conversations
            .append(&[
                RawRecord::new(json!({"session_id": "a"})),
                RawRecord::new(json!({"session_id": "b"})),
            ])
            .unwrap();
        StateFile::new(data.conversations_state())
            .save(&SyncState::new(CursorValue::Offset(40), "run_test"))
            .unwrap();

        RecordStore::new(data.message_store("a"))
            .append(&[RawRecord::new(json!({"fingerprint": 1}))])
            .unwrap();
        RecordStore::new(data.message_store("b"))
            .append(&[
                RawRecord::new(json!({"fingerprint": 2})),
                RawRecord::new(json!({"fingerprint": 3})),
            ])
            .unwrap();
        StateFile::new(data.messages_state())
            .save(&SyncState::new(CursorValue::Index(1), "run_test"))
            .unwrap();

        scribble(&data.conversations_store());
        scribble(&data.message_store("b"));

        let status = gather(&data).unwrap();
        assert_eq!(status.conversations.records, 2);
        assert_eq!(status.conversations.malformed, 1);
        assert!(matches!(
            status.conversations.cursor,
            Some(CursorValue::Offset(40))
        ));
        assert_eq!(status.messages.stores, 2);
        assert_eq!(status.messages.records, 3);
        assert_eq!(status.messages.malformed, 1);
        assert_eq!(status.messages.walk_position, Some(1));
        assert_eq!(status.people.records, 0);
    }

    #[test]
    fn status_serializes_without_absent_cursors() {
        let tmp = TempDir::new().unwrap();
        let status = gather(&DataDir::new(tmp.path())).unwrap();
        let text = serde_json::to_string(&status).unwrap();

        assert!(text.contains("\"conversations\""));
        assert!(text.contains("\"malformed\""));
        assert!(!text.contains("\"cursor\""));
    }
}
