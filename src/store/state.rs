//! Persisted sync state.
//!
//! One small JSON document next to each store records where the last
//! run stopped. It is rewritten atomically after every confirmed page,
//! so a crash at any point resumes at or before the first page that
//! was not fully merged. Re-fetching an already-merged page is safe;
//! the dedup index absorbs it.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::store::jsonl::atomic_write;
use crate::sync::CursorValue;

/// Where to resume, plus bookkeeping about who wrote it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub cursor: CursorValue,
    pub updated_at: DateTime<Utc>,
    pub run_id: String,
}

impl SyncState {
    #[must_use]
    pub fn new(cursor: CursorValue, run_id: &str) -> Self {
        Self {
            cursor,
            updated_at: Utc::now(),
            run_id: run_id.to_string(),
        }
    }
}

/// Handle on a state file.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last saved state, or `None` when the file is missing or no
    /// longer parses. A corrupt state file means starting over, never
    /// failing the run.
    #[must_use]
    pub fn load(&self) -> Option<SyncState> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(state) => Some(state),
            Err(e) => {
                debug!(
                    path = %self.path.display(),
                    "ignoring unreadable state file: {e}"
                );
                None
            }
        }
    }

    /// Persist state atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any file operation fails.
    pub fn save(&self, state: &SyncState) -> Result<()> {
        let content = serde_json::to_string_pretty(state)?;
        atomic_write(&self.path, &content)
    }

    /// Delete the state file. Missing files are fine.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
