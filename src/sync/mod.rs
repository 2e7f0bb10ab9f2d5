//! The incremental sync engine.
//!
//! This module drives paginated remote endpoints into local JSONL
//! stores:
//!
//! - **Cursor**: the three pagination styles and their advancement
//! - **Source**: the `PageSource` seam between driver and API
//! - **Backoff**: bounded retries for throttled and flaky fetches
//! - **Driver**: the fetch / classify / merge / advance loop
//! - **Finalize**: dedup and canonical reordering after each run
//!
//! # Architecture
//!
//! Every run follows the same shape:
//! 1. Load the store, seed the dedup index, read the saved cursor
//! 2. Loop pages through the driver, appending only unseen records
//! 3. Persist the cursor after each confirmed page
//! 4. Finalize the store and report why the run stopped
//!
//! Interrupting a run at any point is safe: the next run resumes from
//! the last confirmed page and re-fetched overlap deduplicates away.
//!
//! # Example
//!
//! ```ignore
//! use cm::sync::{finalize_store, CursorValue, DriverOptions, SyncDriver};
//!
//! let mut driver = SyncDriver::new(&source, &store, &mut index, kind, options)
//!     .with_state(&state_file);
//! let report = driver.run(CursorValue::Offset(0), &run_id).await?;
//! let outcome = finalize_store(&store, kind)?;
//! ```

mod backoff;
mod cursor;
mod driver;
mod finalize;
mod source;
mod types;

// Re-export main types and functions
pub use backoff::{retry_page, BackoffPolicy};
pub use cursor::{CursorHint, CursorValue};
pub use driver::{DriverOptions, SyncDriver, DEFAULT_PAGE_CAP, DEFAULT_PACING};
pub use finalize::{finalize_store, FinalizeOutcome};
pub use source::PageSource;
pub use types::{new_run_id, PageResult, RunReport, StopReason};
