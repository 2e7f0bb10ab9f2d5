//! `cm messages` - mirror message history, conversation by conversation.
//!
//! Walks the mirrored conversation list in file order, keeping its
//! position in a state file so successive runs cover the whole
//! workspace a slice at a time.

use colored::Colorize;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::cli::MessagesArgs;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::RecordKind;
use crate::store::{DedupIndex, RecordStore, StateFile, SyncState};
use crate::sync::{
    finalize_store, new_run_id, CursorValue, DriverOptions, RunReport, StopReason, SyncDriver,
};

pub fn execute(args: &MessagesArgs, config: &Config, json: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;
    rt.block_on(async { execute_async(args, config, json).await })
}

async fn execute_async(args: &MessagesArgs, config: &Config, json: bool) -> Result<()> {
    let conversation_store = RecordStore::new(config.data.conversations_store());
    let state_file = StateFile::new(config.data.messages_state());

    if args.reset {
        state_file.remove()?;
        info!("conversation walk position reset");
    }

    let ids: Vec<String> = conversation_store
        .load()?
        .records
        .iter()
        .filter_map(|record| RecordKind::Conversation.identity(record))
        .collect();

    if ids.is_empty() {
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "success": true,
                    "processed": 0,
                    "message": "no conversations mirrored yet",
                })
            );
        } else {
            println!("{}", "No conversations mirrored yet.".yellow());
            println!("{}", "Run 'cm conversations' first.".dimmed());
        }
        return Ok(());
    }

    let mut position = match state_file.load() {
        Some(state) => match state.cursor {
            CursorValue::Index(position) => position,
            other => {
                warn!(cursor = %other.describe(), "saved cursor has the wrong style, starting over");
                0
            }
        },
        None => 0,
    };
    if position >= ids.len() {
        info!("walk reached the end of the list, starting over");
        position = 0;
    }

    let client = ApiClient::new(config)?;
    let run_id = new_run_id();
    info!(
        run = %run_id,
        position,
        conversations = ids.len(),
        target = args.count,
        "message sync starting"
    );

    let mut totals = RunReport::new(&run_id);
    let mut processed = 0usize;
    let mut failed_units = 0usize;
    let mut throttled = false;

    while position < ids.len() && processed < args.count {
        let conversation_id = &ids[position];
        let store = RecordStore::new(config.data.message_store(conversation_id));
        let loaded = store.load()?;
        let mut index = DedupIndex::from_records(&loaded.records, RecordKind::Message);
        drop(loaded);

        let source = client.messages(conversation_id);
        // The messages endpoint pages by timestamp boundary and ignores
        // the limit parameter, so short pages mean nothing here. Each
        // conversation is drained until it reaches already-seen history.
        let options = DriverOptions {
            stop_when_all_seen: true,
            stop_on_short_page: false,
            ..DriverOptions::new(usize::MAX)
        };

        let report = SyncDriver::new(&source, &store, &mut index, RecordKind::Message, options)
            .run(CursorValue::Boundary(None), &run_id)
            .await?;
        finalize_store(&store, RecordKind::Message)?;
        totals.absorb(&report);

        match report.stop {
            StopReason::Throttled => {
                // Leave the walk position on this conversation so the
                // next run picks it back up.
                warn!(conversation = %conversation_id, "rate limited, stopping the walk here");
                throttled = true;
                break;
            }
            StopReason::TransportFailed | StopReason::MalformedPage => {
                warn!(
                    conversation = %conversation_id,
                    reason = report.stop.describe(),
                    "conversation left incomplete, moving on"
                );
                failed_units += 1;
            }
            _ => {
                info!(
                    conversation = %conversation_id,
                    added = report.added,
                    pages = report.pages,
                    "conversation mirrored"
                );
            }
        }

        processed += 1;
        position += 1;
        state_file.save(&SyncState::new(CursorValue::Index(position), &run_id))?;
    }

    totals.stop = if throttled {
        StopReason::Throttled
    } else if position >= ids.len() {
        StopReason::Exhausted
    } else {
        StopReason::QuotaReached
    };
    if !throttled {
        totals.detail = None;
    }

    if json {
        let output = serde_json::json!({
            "success": totals.failure().is_none(),
            "run": totals,
            "conversations": {
                "total": ids.len(),
                "processed": processed,
                "failed": failed_units,
                "position": position,
            },
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        print_summary(&totals, processed, failed_units, position, ids.len());
    }

    match totals.failure() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn print_summary(totals: &RunReport, processed: usize, failed: usize, position: usize, total: usize) {
    println!("{}", "Message Sync".bold().underline());
    println!();
    println!("  Run:       {}", totals.run_id.dimmed());
    println!(
        "  Processed: {processed} conversations (walk at {position} of {total})"
    );
    if failed > 0 {
        println!("  Failed:    {}", failed.to_string().red());
    }
    println!("  Fetched:   {}", totals.fetched);
    println!("  Added:     {}", totals.added.to_string().green());
    if totals.ignored > 0 {
        println!("  Ignored:   {} (already mirrored)", totals.ignored);
    }
    println!("  Pages:     {}", totals.pages);
    println!("  Stopped:   {}", totals.stop.describe());
}
