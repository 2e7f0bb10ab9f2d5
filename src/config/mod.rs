//! Configuration and archive layout.
//!
//! This module resolves where the local archive lives and which
//! credentials to use against the API.
//!
//! # Architecture
//!
//! chatmirror keeps one archive directory per machine (default
//! `~/.chatmirror`, overridable with `--data-dir` / `CM_DATA_DIR`):
//! - `conversations.jsonl` plus its cursor state
//! - `messages/<conversation>.jsonl`, one store per conversation,
//!   plus the shared walk position
//! - `people.jsonl`
//!
//! Credentials never come from files; they arrive via flags or
//! environment variables and stay in memory.

use std::path::{Path, PathBuf};

use directories::BaseDirs;

use crate::error::{Error, Result};

/// Root of the local archive tree, with the store layout hanging off it.
#[derive(Debug, Clone)]
pub struct DataDir(PathBuf);

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self(root.into())
    }

    /// Explicit path if given, otherwise `~/.chatmirror`.
    ///
    /// # Errors
    ///
    /// Returns an error if no path was given and no home directory can
    /// be determined.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Ok(Self::new(path)),
            None => default_data_dir().map(Self::new).ok_or(Error::ConfigMissing {
                what: "data directory (--data-dir or CM_DATA_DIR)",
            }),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.0
    }

    #[must_use]
    pub fn conversations_store(&self) -> PathBuf {
        self.0.join("conversations.jsonl")
    }

    #[must_use]
    pub fn conversations_state(&self) -> PathBuf {
        self.0.join("conversations.state.json")
    }

    #[must_use]
    pub fn messages_dir(&self) -> PathBuf {
        self.0.join("messages")
    }

    /// Store for one conversation's messages.
    #[must_use]
    pub fn message_store(&self, conversation_id: &str) -> PathBuf {
        self.messages_dir()
            .join(format!("{}.jsonl", safe_component(conversation_id)))
    }

    #[must_use]
    pub fn messages_state(&self) -> PathBuf {
        self.0.join("messages.state.json")
    }

    #[must_use]
    pub fn people_store(&self) -> PathBuf {
        self.0.join("people.jsonl")
    }
}

/// Everything a sync command needs to talk to the API.
#[derive(Debug, Clone)]
pub struct Config {
    pub identifier: String,
    pub key: String,
    pub site_id: String,
    pub base_url: String,
    pub data: DataDir,
}

impl Config {
    /// Resolve configuration from already-parsed CLI values.
    ///
    /// The CLI layer fills these from flags or environment variables;
    /// this only checks presence and shapes the result.
    ///
    /// # Errors
    ///
    /// Returns `ConfigMissing` naming the first absent credential.
    pub fn resolve(
        identifier: Option<&str>,
        key: Option<&str>,
        site: Option<&str>,
        base_url: &str,
        data_dir: Option<&Path>,
    ) -> Result<Self> {
        Ok(Self {
            identifier: required(identifier, "API identifier")?,
            key: required(key, "API key")?,
            site_id: required(site, "website ID")?,
            base_url: base_url.to_string(),
            data: DataDir::resolve(data_dir)?,
        })
    }
}

fn required(value: Option<&str>, what: &'static str) -> Result<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or(Error::ConfigMissing { what })
}

/// `~/.chatmirror`, when a home directory exists.
#[must_use]
pub fn default_data_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().join(".chatmirror"))
}

/// Remote ids become file names; anything outside a safe charset is
/// replaced, and all-dot names are rejected.
fn safe_component(id: &str) -> String {
    let name: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() || name.chars().all(|c| c == '.') {
        return "_".to_string();
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_accepts_complete_credentials() {
        let config = Config::resolve(
            Some("id_1"),
            Some("key_1"),
            Some("site_1"),
            "https://api.crisp.chat/v1",
            Some(Path::new("/tmp/archive")),
        )
        .unwrap();
        assert_eq!(config.identifier, "id_1");
        assert_eq!(config.site_id, "site_1");
        assert_eq!(config.data.root(), Path::new("/tmp/archive"));
    }

    #[test]
    fn resolve_rejects_missing_or_blank_credentials() {
        let missing = Config::resolve(None, Some("k"), Some("s"), "url", Some(Path::new("/tmp")));
        assert!(matches!(
            missing,
            Err(Error::ConfigMissing {
                what: "API identifier"
            })
        ));

        let blank = Config::resolve(
            Some("id"),
            Some("   "),
            Some("s"),
            "url",
            Some(Path::new("/tmp")),
        );
        assert!(matches!(blank, Err(Error::ConfigMissing { what: "API key" })));
    }

    #[test]
    fn archive_layout_hangs_off_the_root() {
        let data = DataDir::new("/archive");
        assert_eq!(
            data.conversations_store(),
            PathBuf::from("/archive/conversations.jsonl")
        );
        assert_eq!(
            data.conversations_state(),
            PathBuf::from("/archive/conversations.state.json")
        );
        assert_eq!(
            data.message_store("session_abc"),
            PathBuf::from("/archive/messages/session_abc.jsonl")
        );
        assert_eq!(
            data.messages_state(),
            PathBuf::from("/archive/messages.state.json")
        );
        assert_eq!(data.people_store(), PathBuf::from("/archive/people.jsonl"));
    }

    #[test]
    fn unsafe_id_characters_never_reach_the_filesystem() {
        let data = DataDir::new("/archive");
        assert_eq!(
            data.message_store("../../etc/passwd"),
            PathBuf::from("/archive/messages/.._.._etc_passwd.jsonl")
        );
        assert_eq!(
            data.message_store(".."),
            PathBuf::from("/archive/messages/_.jsonl")
        );
        assert_eq!(
            data.message_store("s id/with spaces"),
            PathBuf::from("/archive/messages/s_id_with_spaces.jsonl")
        );
    }
}
