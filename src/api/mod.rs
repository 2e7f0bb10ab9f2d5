//! Upstream API access.

mod client;

pub use client::{ApiClient, ConversationSource, MessageSource};
