//! The page-by-page sync loop.
//!
//! One `SyncDriver::run` call mirrors one paginated source into one
//! record store: fetch a page, classify it, merge the new records,
//! advance the cursor, persist state, repeat. Every page is confirmed
//! (merged and state saved) before the next fetch, so interrupting the
//! process at any point loses at most the page in flight.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::{RawRecord, RecordKind};
use crate::store::{DedupIndex, RecordStore, StateFile, SyncState};
use crate::sync::backoff::{retry_page, BackoffPolicy};
use crate::sync::cursor::CursorValue;
use crate::sync::source::PageSource;
use crate::sync::types::{PageResult, RunReport, StopReason};

/// Most records one request may ask for.
pub const DEFAULT_PAGE_CAP: usize = 50;

/// Pause between successive page fetches.
pub const DEFAULT_PACING: Duration = Duration::from_millis(100);

/// Per-run knobs.
#[derive(Debug, Clone, Copy)]
pub struct DriverOptions {
    /// Stop once this many new records were added.
    pub target: usize,
    /// Upper bound on records per request.
    pub page_cap: usize,
    /// Pause between successful pages.
    pub pacing: Duration,
    /// Stop when a non-empty page adds nothing new. Used by walks that
    /// go newest-to-oldest into history mirrored by earlier runs.
    pub stop_when_all_seen: bool,
    /// Treat a page shorter than requested as the end of the data.
    /// Only meaningful for endpoints that honor the requested size.
    pub stop_on_short_page: bool,
}

impl DriverOptions {
    #[must_use]
    pub const fn new(target: usize) -> Self {
        Self {
            target,
            page_cap: DEFAULT_PAGE_CAP,
            pacing: DEFAULT_PACING,
            stop_when_all_seen: false,
            stop_on_short_page: true,
        }
    }
}

/// Drives one source into one store.
pub struct SyncDriver<'a, S> {
    source: &'a S,
    store: &'a RecordStore,
    index: &'a mut DedupIndex,
    kind: RecordKind,
    state: Option<&'a StateFile>,
    policy: BackoffPolicy,
    options: DriverOptions,
}

impl<'a, S: PageSource> SyncDriver<'a, S> {
    pub fn new(
        source: &'a S,
        store: &'a RecordStore,
        index: &'a mut DedupIndex,
        kind: RecordKind,
        options: DriverOptions,
    ) -> Self {
        Self {
            source,
            store,
            index,
            kind,
            state: None,
            policy: BackoffPolicy::default(),
            options,
        }
    }

    /// Persist the cursor to this state file after every confirmed page.
    #[must_use]
    pub fn with_state(mut self, state: &'a StateFile) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run the loop from `start` until a stop condition is hit.
    ///
    /// Always returns a report; abnormal endings are carried in its
    /// stop reason rather than as errors. Errors are reserved for
    /// local store and state I/O failures.
    ///
    /// # Errors
    ///
    /// Returns an error if appending to the store or saving state fails.
    pub async fn run(&mut self, start: CursorValue, run_id: &str) -> Result<RunReport> {
        let mut report = RunReport::new(run_id);
        let mut cursor = start;
        let source = self.source;

        loop {
            let remaining = self.options.target.saturating_sub(report.added);
            if remaining == 0 {
                report.stop = StopReason::QuotaReached;
                break;
            }
            let page_size = remaining.min(self.options.page_cap);

            debug!(
                store = self.kind.store_name(),
                cursor = %cursor.describe(),
                page_size,
                "fetching page"
            );
            let result =
                retry_page(&self.policy, || source.fetch_page(&cursor, page_size)).await;

            let (records, hint) = match result {
                PageResult::Records { records, hint } => (records, hint),
                PageResult::Exhausted => {
                    report.stop = StopReason::Exhausted;
                    break;
                }
                PageResult::RateLimited { .. } => {
                    report.stop = StopReason::Throttled;
                    break;
                }
                PageResult::Transient(detail) => {
                    report.stop = StopReason::TransportFailed;
                    report.detail = Some(detail);
                    break;
                }
                PageResult::Malformed(detail) => {
                    report.stop = StopReason::MalformedPage;
                    report.detail = Some(detail);
                    break;
                }
            };
            if records.is_empty() {
                report.stop = StopReason::Exhausted;
                break;
            }

            report.pages += 1;
            let page_len = records.len();
            report.fetched += page_len;

            let (fresh, quota_mid_page) = self.merge(records, &mut report);
            if !fresh.is_empty() {
                self.store.append(&fresh)?;
            }
            info!(
                store = self.kind.store_name(),
                page = report.pages,
                fetched = page_len,
                added = fresh.len(),
                "page merged"
            );

            if quota_mid_page {
                // The page tail was not merged. Leave the cursor at the
                // page start; the next run re-fetches it and dedup
                // absorbs the overlap.
                report.stop = StopReason::QuotaReached;
                self.save_state(cursor, run_id)?;
                break;
            }

            if self.options.stop_when_all_seen && fresh.is_empty() {
                report.stop = StopReason::CaughtUp;
                break;
            }

            match cursor.advance(&hint) {
                Some(next) => {
                    cursor = next;
                    self.save_state(cursor, run_id)?;
                }
                None => {
                    warn!(
                        store = self.kind.store_name(),
                        cursor = %cursor.describe(),
                        "cursor failed to advance, stopping"
                    );
                    report.stop = StopReason::Stalled;
                    break;
                }
            }

            if self.options.stop_on_short_page && page_len < page_size {
                report.stop = StopReason::Exhausted;
                break;
            }

            tokio::time::sleep(self.options.pacing).await;
        }

        debug!(
            store = self.kind.store_name(),
            added = report.added,
            ignored = report.ignored,
            pages = report.pages,
            stop = report.stop.describe(),
            "run finished"
        );
        Ok(report)
    }

    /// Split a page into records to append, counting duplicates and
    /// identity-less records as ignored. New records past the target
    /// are left unmerged, and their presence is reported so the cursor
    /// stays on this page.
    fn merge(&mut self, records: Vec<RawRecord>, report: &mut RunReport) -> (Vec<RawRecord>, bool) {
        let mut fresh = Vec::new();
        let mut leftover = false;
        for record in records {
            match self.kind.identity(&record) {
                Some(identity) => {
                    if self.index.contains(&identity) {
                        report.ignored += 1;
                    } else if report.added < self.options.target {
                        self.index.insert(identity);
                        fresh.push(record);
                        report.added += 1;
                    } else {
                        leftover = true;
                    }
                }
                None => report.ignored += 1,
            }
        }
        (fresh, leftover)
    }

    fn save_state(&self, cursor: CursorValue, run_id: &str) -> Result<()> {
        if let Some(state_file) = self.state {
            state_file.save(&SyncState::new(cursor, run_id))?;
        }
        Ok(())
    }
}
