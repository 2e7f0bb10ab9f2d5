//! `cm people` - mirror user profiles for emails seen in conversations.
//!
//! There is no list endpoint for profiles, so the mirrored
//! conversation list is scanned for customer emails and each profile
//! is fetched one at a time.

use colored::Colorize;
use serde_json::Value;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::cli::PeopleArgs;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{RawRecord, RecordKind};
use crate::store::{DedupIndex, RecordStore};
use crate::sync::{finalize_store, new_run_id, retry_page, BackoffPolicy, PageResult};

use super::format_size;

pub fn execute(args: &PeopleArgs, config: &Config, json: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;
    rt.block_on(async { execute_async(args, config, json).await })
}

async fn execute_async(args: &PeopleArgs, config: &Config, json: bool) -> Result<()> {
    let conversation_store = RecordStore::new(config.data.conversations_store());
    let store = RecordStore::new(config.data.people_store());

    if args.reset {
        store.remove()?;
        info!("people store removed");
    }

    let conversations = conversation_store.load()?.records;
    if conversations.is_empty() {
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "success": true,
                    "added": 0,
                    "message": "no conversations mirrored yet",
                })
            );
        } else {
            println!("{}", "No conversations mirrored yet.".yellow());
            println!("{}", "Run 'cm conversations' first.".dimmed());
        }
        return Ok(());
    }

    let mut index = DedupIndex::from_records(&store.load()?.records, RecordKind::User);

    let client = ApiClient::new(config)?;
    let policy = BackoffPolicy::default();
    let run_id = new_run_id();
    info!(
        run = %run_id,
        conversations = conversations.len(),
        known = index.len(),
        target = args.count,
        "people sync starting"
    );

    let mut added = 0usize;
    let mut failed = 0usize;
    let mut skipped = 0usize;
    let mut throttled = false;

    for conversation in &conversations {
        if added >= args.count {
            break;
        }
        // Conversations carry the customer email under meta, which is
        // the same probe the profile store is keyed by.
        let Some(email) = RecordKind::User.identity(conversation) else {
            continue;
        };
        if index.contains(&email) {
            skipped += 1;
            continue;
        }

        match retry_page(&policy, || client.fetch_profile(&email)).await {
            PageResult::Records { mut records, .. } => {
                let Some(record) = records.pop() else {
                    failed += 1;
                    continue;
                };
                let record = ensure_email(record, &email);
                store.append(std::slice::from_ref(&record))?;
                index.insert(email.clone());
                added += 1;
                info!(email = %email, "profile mirrored");
            }
            PageResult::RateLimited { .. } => {
                warn!(email = %email, "rate limited past the retry budget, stopping");
                throttled = true;
                break;
            }
            PageResult::Transient(detail) => {
                warn!(email = %email, detail, "profile fetch failed");
                failed += 1;
            }
            PageResult::Malformed(detail) => {
                warn!(email = %email, detail, "no usable profile");
                failed += 1;
            }
            PageResult::Exhausted => {
                failed += 1;
            }
        }
    }

    let outcome = finalize_store(&store, RecordKind::User)?;
    let stopped = if throttled {
        "rate limited"
    } else if added >= args.count {
        "target count reached"
    } else {
        "email list exhausted"
    };

    if json {
        let output = serde_json::json!({
            "success": !throttled,
            "run_id": run_id,
            "added": added,
            "failed": failed,
            "skipped_known": skipped,
            "stopped": stopped,
            "finalize": outcome,
            "store_path": store.path().display().to_string(),
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{}", "People Sync".bold().underline());
        println!();
        println!("  Run:     {}", run_id.dimmed());
        println!("  Added:   {}", added.to_string().green());
        if failed > 0 {
            println!("  Failed:  {}", failed.to_string().red());
        }
        if skipped > 0 {
            println!("  Skipped: {skipped} already mirrored");
        }
        println!("  Stopped: {stopped}");
        println!();
        println!(
            "  Store: {} profiles ({}) at {}",
            outcome.total,
            format_size(store.size_bytes()),
            store.path().display()
        );
    }

    if throttled {
        Err(Error::Throttled)
    } else {
        Ok(())
    }
}

/// Profiles are stored keyed by the email they were fetched for, so
/// make sure the field is present on the record itself.
fn ensure_email(record: RawRecord, email: &str) -> RawRecord {
    let mut value = record.into_value();
    if let Value::Object(map) = &mut value {
        let missing = map
            .get("email")
            .and_then(Value::as_str)
            .is_none_or(|s| s.trim().is_empty());
        if missing {
            map.insert("email".to_string(), Value::String(email.to_string()));
        }
    }
    RawRecord::new(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ensure_email_fills_missing_field() {
        let record = ensure_email(RawRecord::new(json!({"person": {}})), "a@b.co");
        assert_eq!(record.value()["email"], "a@b.co");
    }

    #[test]
    fn ensure_email_replaces_blank_field() {
        let record = ensure_email(RawRecord::new(json!({"email": "  "})), "a@b.co");
        assert_eq!(record.value()["email"], "a@b.co");
    }

    #[test]
    fn ensure_email_keeps_existing_field() {
        let record = ensure_email(RawRecord::new(json!({"email": "x@y.z"})), "a@b.co");
        assert_eq!(record.value()["email"], "x@y.z");
    }
}
