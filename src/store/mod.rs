//! Local persistence: JSONL record stores, sync state, dedup index.

pub mod dedup;
pub mod jsonl;
pub mod state;

pub use dedup::DedupIndex;
pub use jsonl::{LoadedStore, RecordStore};
pub use state::{StateFile, SyncState};
