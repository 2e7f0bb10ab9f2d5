//! Data model for chatmirror.
//!
//! This module contains the record domain:
//! - `RawRecord`: schema-free remote payloads
//! - `RecordKind`: per-family identity, recency and ordering rules
//! - identity strategies for conversations, messages and users

pub mod identity;
pub mod record;

pub use identity::content_hash;
pub use record::{RawRecord, RecordKind};
