//! chatmirror - incremental mirroring of a Crisp workspace
//!
//! This crate provides the core functionality for the `cm` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`api`] - Crisp REST client and page classification
//! - [`model`] - Raw records, identity probing, recency
//! - [`store`] - Append-only JSONL stores and cursor state files
//! - [`sync`] - Cursor-driven page loop, retry, finalization
//! - [`config`] - Credentials and archive layout
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod store;
pub mod sync;

pub use error::{Error, Result};
