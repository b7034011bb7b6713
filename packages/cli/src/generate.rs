//! One-shot area generation.

use chrono::{FixedOffset, Local};
use safezone_aggregation::export::to_feature_collection;
use safezone_aggregation::{AreaAggregationEngine, GenerateContext};
use safezone_area_models::{BoundingBox, LatLng};

use crate::OutputFormat;

/// A single generation request from the command line.
pub struct Request {
    pub north: f64,
    pub east: f64,
    pub south: f64,
    pub west: f64,
    pub zoom: f64,
    pub max_cells: Option<usize>,
    /// `(lat, lng)` of the reference location.
    pub reference: Option<(f64, f64)>,
    /// Local time offset in minutes; the machine's offset when absent.
    pub utc_offset_minutes: Option<i32>,
}

/// Generates areas for `request` and prints them to stdout.
pub async fn run(
    engine: &AreaAggregationEngine,
    request: Request,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let bounds = BoundingBox::new(
        LatLng::new(request.north, request.east),
        LatLng::new(request.south, request.west),
    );

    let utc_offset = match request.utc_offset_minutes {
        Some(minutes) => minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| format!("UTC offset of {minutes} minutes is out of range"))?,
        None => *Local::now().offset(),
    };

    let mut ctx = GenerateContext::new(request.zoom).with_utc_offset(utc_offset);
    if let Some((lat, lng)) = request.reference {
        ctx = ctx.with_reference(LatLng::new(lat, lng));
    }
    if let Some(max_cells) = request.max_cells {
        ctx = ctx.with_max_cells(max_cells);
    }

    let snapshot = engine.generate(bounds, ctx).await?;
    log::info!("{}", serde_json::to_string(&snapshot.summary())?);

    let output = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&snapshot.areas)?,
        OutputFormat::Geojson => serde_json::to_string_pretty(&to_feature_collection(&snapshot.areas))?,
    };
    println!("{output}");

    Ok(())
}
