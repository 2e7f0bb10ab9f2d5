//! `cm conversations` - mirror the workspace conversation list.

use colored::Colorize;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::cli::ConversationsArgs;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::RecordKind;
use crate::store::{DedupIndex, RecordStore, StateFile};
use crate::sync::{
    finalize_store, new_run_id, CursorValue, DriverOptions, FinalizeOutcome, RunReport, SyncDriver,
};

use super::format_size;

pub fn execute(args: &ConversationsArgs, config: &Config, json: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;
    rt.block_on(async { execute_async(args, config, json).await })
}

async fn execute_async(args: &ConversationsArgs, config: &Config, json: bool) -> Result<()> {
    let store = RecordStore::new(config.data.conversations_store());
    let state_file = StateFile::new(config.data.conversations_state());

    if args.reset {
        store.remove()?;
        state_file.remove()?;
        info!("conversation store and cursor state removed");
    }

    let loaded = store.load()?;
    if loaded.malformed > 0 {
        warn!(
            lines = loaded.malformed,
            "store has unreadable lines, they will be dropped at finalization"
        );
    }
    let mut index = DedupIndex::from_records(&loaded.records, RecordKind::Conversation);
    drop(loaded);

    let start = match state_file.load() {
        Some(state) => match state.cursor {
            cursor @ CursorValue::Offset(_) => cursor,
            other => {
                warn!(cursor = %other.describe(), "saved cursor has the wrong style, starting over");
                CursorValue::Offset(0)
            }
        },
        None => CursorValue::Offset(0),
    };

    let client = ApiClient::new(config)?;
    let source = client.conversations();
    let run_id = new_run_id();
    info!(run = %run_id, start = %start.describe(), target = args.count, "conversation sync starting");

    let report = SyncDriver::new(
        &source,
        &store,
        &mut index,
        RecordKind::Conversation,
        DriverOptions::new(args.count),
    )
    .with_state(&state_file)
    .run(start, &run_id)
    .await?;

    let outcome = finalize_store(&store, RecordKind::Conversation)?;

    if json {
        let output = serde_json::json!({
            "success": report.failure().is_none(),
            "run": report,
            "finalize": outcome,
            "store_path": store.path().display().to_string(),
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        print_summary(&report, &outcome, &store);
    }

    match report.failure() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn print_summary(report: &RunReport, outcome: &FinalizeOutcome, store: &RecordStore) {
    println!("{}", "Conversation Sync".bold().underline());
    println!();
    println!("  Run:     {}", report.run_id.dimmed());
    println!("  Fetched: {}", report.fetched);
    println!("  Added:   {}", report.added.to_string().green());
    if report.ignored > 0 {
        println!("  Ignored: {} (already mirrored)", report.ignored);
    }
    println!("  Pages:   {}", report.pages);
    println!("  Stopped: {}", report.stop.describe());
    if let Some(detail) = &report.detail {
        println!("  Detail:  {}", detail.red());
    }
    println!();
    println!(
        "  Store: {} records ({}) at {}",
        outcome.total,
        format_size(store.size_bytes()),
        store.path().display()
    );
    if outcome.collapsed > 0 || outcome.dropped > 0 || outcome.malformed > 0 {
        println!(
            "  Cleaned: {} duplicate, {} identity-less, {} unreadable",
            outcome.collapsed, outcome.dropped, outcome.malformed
        );
    }
}
