//! Append-only JSONL record stores.
//!
//! One store per record family, one JSON document per line. Appends are
//! the hot path during a sync run; full rewrites happen only at
//! finalization and go through a temp file plus atomic rename so a
//! crash never leaves a half-written store.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::model::RawRecord;

/// Records read from a store, with the count of lines that no longer
/// parse. Unreadable lines are reported, never fatal: one corrupt line
/// must not block a sync run.
#[derive(Debug, Default)]
pub struct LoadedStore {
    pub records: Vec<RawRecord>,
    pub malformed: usize,
}

/// A JSONL file holding one record family.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record in file order.
    ///
    /// A missing file is an empty store. Blank lines are skipped;
    /// unparseable lines are skipped and counted.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load(&self) -> Result<LoadedStore> {
        if !self.path.exists() {
            return Ok(LoadedStore::default());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut loaded = LoadedStore::default();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RawRecord>(&line) {
                Ok(record) => loaded.records.push(record),
                Err(e) => {
                    debug!(
                        path = %self.path.display(),
                        line = line_num + 1,
                        "skipping unreadable store line: {e}"
                    );
                    loaded.malformed += 1;
                }
            }
        }

        Ok(loaded)
    }

    /// Append records, one JSON line each, syncing once at the end.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or written.
    pub fn append(&self, records: &[RawRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        for record in records {
            let line = serde_json::to_string(record)?;
            writeln!(file, "{line}")?;
        }
        file.sync_all()?;

        Ok(())
    }

    /// Replace the whole store atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any file operation fails.
    pub fn rewrite(&self, records: &[RawRecord]) -> Result<()> {
        let mut content = String::new();
        for record in records {
            content.push_str(&serde_json::to_string(record)?);
            content.push('\n');
        }
        atomic_write(&self.path, &content)
    }

    /// Non-blank line count, without parsing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn line_count(&self) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut count = 0;
        for line in reader.lines() {
            if !line?.trim().is_empty() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// File size in bytes; 0 if the store does not exist yet.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    /// Delete the store file. Missing files are fine.
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

/// Write content to a file atomically.
///
/// Writes to a sibling `.tmp` file, fsyncs, then renames over the
/// target. If any step fails the original file remains untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let temp_path = temp_sibling(path);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        // Sync to disk before rename
        writer.get_ref().sync_all()?;
    }

    fs::rename(&temp_path, path)?;

    Ok(())
}

/// `foo.jsonl` -> `foo.jsonl.tmp`, keeping multi-dot names intact.
fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}
