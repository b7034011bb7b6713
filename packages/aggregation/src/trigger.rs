//! Debounced regeneration from viewport change events.

use std::sync::Arc;
use std::time::Duration;

use chrono::FixedOffset;
use safezone_area_models::{BoundingBox, LatLng};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::AggregationError;
use crate::engine::{AreaAggregationEngine, AreaSnapshot, GenerateContext};

/// A "viewport bounds changed" event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportChange {
    /// New visible bounds.
    pub bounds: BoundingBox,
    /// New zoom level.
    pub zoom: f64,
    /// Optional reference location, such as the user's position.
    #[serde(default)]
    pub reference: Option<LatLng>,
    /// Optional cell budget override.
    #[serde(default)]
    pub max_cells: Option<usize>,
    /// Local time offset of the viewport from UTC, in minutes.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

impl ViewportChange {
    fn context(&self) -> GenerateContext {
        let mut ctx = GenerateContext::new(self.zoom);
        ctx.reference = self.reference;
        ctx.max_cells = self.max_cells;
        if let Some(minutes) = self.utc_offset_minutes {
            match minutes.checked_mul(60).and_then(FixedOffset::east_opt) {
                Some(offset) => ctx.utc_offset = offset,
                None => log::warn!("Ignoring out-of-range UTC offset of {minutes} minutes"),
            }
        }
        ctx
    }
}

type RunResult = Result<Arc<AreaSnapshot>, AggregationError>;

fn spawn_run(
    runs: &mut JoinSet<RunResult>,
    engine: &Arc<AreaAggregationEngine>,
    change: ViewportChange,
) {
    let engine = Arc::clone(engine);
    runs.spawn(async move {
        let ctx = change.context();
        engine.generate(change.bounds, ctx).await
    });
}

fn record(result: Result<RunResult, tokio::task::JoinError>, published: &mut usize) {
    match result {
        Ok(Ok(snapshot)) => {
            *published += 1;
            log::debug!(
                "Published generation {} ({} areas)",
                snapshot.generation,
                snapshot.areas.len()
            );
        }
        Ok(Err(AggregationError::Superseded { generation })) => {
            log::debug!("Generation {generation} dropped");
        }
        Ok(Err(e)) => log::error!("Area generation failed: {e}"),
        Err(e) => log::error!("Area generation task failed: {e}"),
    }
}

/// Regenerates areas from a stream of viewport changes.
///
/// Changes arriving within `debounce` of each other are coalesced; only
/// the last one triggers a run once the stream has been quiet for
/// `debounce`. A new run supersedes any run still in progress. When the
/// sender side closes, a pending change is run immediately and all
/// in-flight runs are awaited.
///
/// Returns the number of snapshots published.
pub async fn run_debounced(
    engine: Arc<AreaAggregationEngine>,
    mut changes: mpsc::Receiver<ViewportChange>,
    debounce: Duration,
) -> usize {
    let mut runs = JoinSet::new();
    let mut pending: Option<ViewportChange> = None;
    let mut deadline = Instant::now();
    let mut published = 0;

    loop {
        tokio::select! {
            change = changes.recv() => {
                let Some(change) = change else { break };
                if pending.replace(change).is_some() {
                    log::debug!("Coalesced viewport change");
                }
                deadline = Instant::now() + debounce;
            }
            () = tokio::time::sleep_until(deadline), if pending.is_some() => {
                if let Some(change) = pending.take() {
                    spawn_run(&mut runs, &engine, change);
                }
            }
            Some(result) = runs.join_next(), if !runs.is_empty() => {
                record(result, &mut published);
            }
        }
    }

    if let Some(change) = pending.take() {
        spawn_run(&mut runs, &engine, change);
    }
    while let Some(result) = runs.join_next().await {
        record(result, &mut published);
    }

    published
}
