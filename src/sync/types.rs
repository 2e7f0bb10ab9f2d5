//! Shared types for the sync engine.

use std::time::Duration;

use serde::Serialize;

use crate::error::Error;
use crate::model::RawRecord;
use crate::sync::cursor::CursorHint;

/// Classified outcome of one page fetch.
///
/// Fetchers never surface transport errors directly; every response is
/// folded into one of these variants so the driver's handling stays
/// uniform across endpoints.
#[derive(Debug)]
pub enum PageResult {
    /// Records plus the continuation information for the next cursor.
    Records {
        records: Vec<RawRecord>,
        hint: CursorHint,
    },
    /// The remote answered 429; `retry_after` is its suggested wait.
    RateLimited { retry_after: Option<Duration> },
    /// Network or server failure worth retrying at the same cursor.
    Transient(String),
    /// Undecodable or unexpected response; retrying cannot help.
    Malformed(String),
    /// No records at this cursor: the end of the remote data.
    Exhausted,
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The remote returned an empty or short page.
    Exhausted,
    /// The requested number of new records was added.
    QuotaReached,
    /// A non-empty page contributed nothing new.
    CaughtUp,
    /// The retry budget ran out while rate limited.
    Throttled,
    /// Transient failures persisted past the retry budget.
    TransportFailed,
    /// The response body could not be interpreted.
    MalformedPage,
    /// The cursor failed to advance between pages.
    Stalled,
}

impl StopReason {
    /// Human label for summaries.
    #[must_use]
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::Exhausted => "remote exhausted",
            Self::QuotaReached => "target count reached",
            Self::CaughtUp => "caught up with mirrored history",
            Self::Throttled => "rate limited",
            Self::TransportFailed => "network failure",
            Self::MalformedPage => "unreadable response",
            Self::Stalled => "cursor stalled",
        }
    }
}

/// Counters and outcome of one driver run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    /// Records the remote returned, including already-known ones.
    pub fetched: usize,
    /// Records newly appended to the store.
    pub added: usize,
    /// Duplicates and identity-less records.
    pub ignored: usize,
    pub pages: usize,
    pub stop: StopReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl RunReport {
    #[must_use]
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            fetched: 0,
            added: 0,
            ignored: 0,
            pages: 0,
            stop: StopReason::Exhausted,
            detail: None,
        }
    }

    /// Fold another report's counters into this one, keeping the
    /// other's stop reason. Used by the per-conversation walk to
    /// aggregate inner runs.
    pub fn absorb(&mut self, other: &Self) {
        self.fetched += other.fetched;
        self.added += other.added;
        self.ignored += other.ignored;
        self.pages += other.pages;
        self.stop = other.stop;
        self.detail.clone_from(&other.detail);
    }

    /// The error a caller should exit with, if the stop reason was an
    /// abnormal one. Normal terminations return `None`.
    #[must_use]
    pub fn failure(&self) -> Option<Error> {
        let detail = || self.detail.clone().unwrap_or_default();
        match self.stop {
            StopReason::Throttled => Some(Error::Throttled),
            StopReason::TransportFailed => Some(Error::Network(detail())),
            StopReason::MalformedPage => Some(Error::MalformedResponse(detail())),
            StopReason::Exhausted
            | StopReason::QuotaReached
            | StopReason::CaughtUp
            | StopReason::Stalled => None,
        }
    }
}

/// Short unique id stamped on state files and summaries, so a state
/// file can be traced back to the run that wrote it.
#[must_use]
pub fn new_run_id() -> String {
    format!("run_{}", &uuid::Uuid::new_v4().to_string()[..12])
}
