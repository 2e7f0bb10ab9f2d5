//! Cursor styles and advancement.
//!
//! The three upstream endpoints paginate three different ways. One sum
//! type covers them so the driver, the state file and the status view
//! share a single representation:
//! - `Offset`: numeric skip into the conversation list
//! - `Boundary`: exclusive upper timestamp bound walking message
//!   history newest to oldest
//! - `Index`: position in the local conversation list for the
//!   per-conversation walk
//!
//! Advancement must make progress. A hint that would leave the cursor
//! where it is (or move it the wrong way) yields `None`, and the driver
//! terminates the run instead of looping on the same page forever.

use serde::{Deserialize, Serialize};

/// Persisted pagination position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "style", content = "value", rename_all = "snake_case")]
pub enum CursorValue {
    /// Records to skip from the top of the remote list.
    Offset(u64),
    /// Exclusive upper bound on record recency; `None` means "newest
    /// page first".
    Boundary(Option<u64>),
    /// Position in a locally-derived work list.
    Index(usize),
}

/// Continuation information extracted from a fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorHint {
    /// Number of records on the page.
    Count(usize),
    /// Minimum recency value observed on the page.
    Oldest(u64),
    /// Move to the next work-list entry.
    Step,
}

impl CursorValue {
    /// Compute the next cursor, or `None` when the hint cannot move
    /// this cursor forward.
    #[must_use]
    pub fn advance(&self, hint: &CursorHint) -> Option<Self> {
        match (self, hint) {
            (Self::Offset(offset), CursorHint::Count(count)) if *count > 0 => {
                Some(Self::Offset(offset + *count as u64))
            }
            (Self::Boundary(previous), CursorHint::Oldest(oldest)) => match previous {
                // The bound must strictly tighten, otherwise the next
                // fetch would return the same page again.
                Some(bound) if oldest >= bound => None,
                _ => Some(Self::Boundary(Some(*oldest))),
            },
            (Self::Index(position), CursorHint::Step) => Some(Self::Index(position + 1)),
            _ => None,
        }
    }

    /// Short human rendering for status output and log lines.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Offset(offset) => format!("offset {offset}"),
            Self::Boundary(None) => "newest page".to_string(),
            Self::Boundary(Some(bound)) => format!("before {bound}"),
            Self::Index(position) => format!("position {position}"),
        }
    }
}
