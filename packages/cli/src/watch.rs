//! Debounced regeneration driven by stdin.
//!
//! Each stdin line is a JSON `ViewportChange`. Malformed lines are logged
//! and skipped. The command exits once stdin closes and every pending run
//! has finished.

use std::sync::Arc;
use std::time::Duration;

use safezone_aggregation::{AreaAggregationEngine, ViewportChange, run_debounced};
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tokio::sync::mpsc;

/// Event channel capacity.
const CHANNEL_CAPACITY: usize = 64;

/// Reads viewport changes from stdin and prints one summary line per
/// published snapshot.
pub async fn run(
    engine: Arc<AreaAggregationEngine>,
    debounce: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let (tx, rx) = mpsc::channel::<ViewportChange>(CHANNEL_CAPACITY);
    let mut snapshots = engine.subscribe();

    let printer = tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            match serde_json::to_string(&snapshot.summary()) {
                Ok(line) => println!("{line}"),
                Err(e) => log::error!("Failed to serialize summary: {e}"),
            }
        }
    });

    let runner = tokio::spawn(run_debounced(engine, rx, debounce));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_number = 0_usize;
    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ViewportChange>(&line) {
            Ok(change) => {
                if tx.send(change).await.is_err() {
                    break;
                }
            }
            Err(e) => log::warn!("Skipping line {line_number}: {e}"),
        }
    }
    drop(tx);

    let published = runner.await?;
    // The runner held the last engine handle, so the printer sees the
    // channel close once it has printed everything.
    printer.await?;

    log::info!("Published {published} snapshots");
    Ok(())
}
