#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command line front end for safety area generation.
//!
//! `safezone generate` runs the pipeline once for a bounding box and
//! prints the areas as JSON or `GeoJSON`. `safezone watch` reads viewport
//! change events as newline-delimited JSON from stdin and prints a summary
//! line for every published snapshot.
//!
//! Scoring goes to a remote service when a scorer URL is configured
//! (`--scorer-url` or `SAFEZONE_SCORER_URL`), otherwise to the offline
//! fallback scorer.

mod generate;
mod watch;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use safezone_aggregation::{AreaAggregationEngine, EngineConfig};
use safezone_cli_utils::{IndicatifProgress, MultiProgress};
use safezone_scoring::AreaScorer;
use safezone_scoring::fallback::FallbackScorer;
use safezone_scoring::http::HttpScorer;

#[derive(Parser)]
#[command(name = "safezone", about = "Safety area generation for map viewports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand.
#[derive(clap::Args)]
struct EngineArgs {
    /// TOML file overriding the default engine configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Remote scoring service URL
    #[arg(long)]
    scorer_url: Option<String>,
    /// Seed for sampling jitter
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Geojson,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate areas for one bounding box
    Generate {
        /// Northern latitude of the viewport
        #[arg(long, allow_hyphen_values = true)]
        north: f64,
        /// Eastern longitude of the viewport
        #[arg(long, allow_hyphen_values = true)]
        east: f64,
        /// Southern latitude of the viewport
        #[arg(long, allow_hyphen_values = true)]
        south: f64,
        /// Western longitude of the viewport
        #[arg(long, allow_hyphen_values = true)]
        west: f64,
        /// Map zoom level
        #[arg(long)]
        zoom: f64,
        /// Maximum number of sample cells
        #[arg(long)]
        max_cells: Option<usize>,
        /// Reference latitude (defaults to the viewport center)
        #[arg(long, allow_hyphen_values = true, requires = "ref_lng")]
        ref_lat: Option<f64>,
        /// Reference longitude (defaults to the viewport center)
        #[arg(long, allow_hyphen_values = true, requires = "ref_lat")]
        ref_lng: Option<f64>,
        /// Local time offset from UTC in minutes (defaults to this machine's)
        #[arg(long, allow_hyphen_values = true)]
        utc_offset_minutes: Option<i32>,
        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Regenerate areas from viewport changes read from stdin
    Watch {
        /// Quiet period before a change triggers a run, in milliseconds
        #[arg(long)]
        debounce_ms: Option<u64>,
        #[command(flatten)]
        engine: EngineArgs,
    },
}

impl EngineArgs {
    /// Loads the configuration with flag overrides applied.
    fn load(&self) -> Result<EngineConfig, Box<dyn std::error::Error>> {
        let mut config = EngineConfig::load(self.config.as_deref())?;
        if let Some(url) = &self.scorer_url {
            config.engine.scorer_url = Some(url.clone());
        }
        if let Some(seed) = self.seed {
            config.engine.seed = seed;
        }
        Ok(config)
    }
}

/// Builds an engine for `config`, reporting scoring progress to `multi`.
fn build_engine(
    config: EngineConfig,
    multi: &MultiProgress,
) -> Result<AreaAggregationEngine, Box<dyn std::error::Error>> {
    let scorer: Arc<dyn AreaScorer> = match &config.engine.scorer_url {
        Some(url) => {
            log::info!("Scoring with remote service at {url}");
            Arc::new(HttpScorer::new(
                url.clone(),
                Duration::from_millis(config.scoring.timeout_ms),
            )?)
        }
        None => {
            log::info!("No scorer URL configured, scoring offline");
            Arc::new(FallbackScorer)
        }
    };

    let progress = IndicatifProgress::scoring_bar(multi, "Scoring");
    Ok(AreaAggregationEngine::new(scorer, config)?.with_progress(progress))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = safezone_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            north,
            east,
            south,
            west,
            zoom,
            max_cells,
            ref_lat,
            ref_lng,
            utc_offset_minutes,
            format,
            engine,
        } => {
            let config = engine.load()?;
            let engine = build_engine(config, &multi)?;
            let request = generate::Request {
                north,
                east,
                south,
                west,
                zoom,
                max_cells,
                reference: ref_lat.zip(ref_lng),
                utc_offset_minutes,
            };
            generate::run(&engine, request, format).await?;
        }
        Commands::Watch {
            debounce_ms,
            engine,
        } => {
            let mut config = engine.load()?;
            if let Some(ms) = debounce_ms {
                config.engine.debounce_ms = ms;
            }
            let debounce = Duration::from_millis(config.engine.debounce_ms);
            let engine = Arc::new(build_engine(config, &multi)?);
            watch::run(engine, debounce).await?;
        }
    }

    Ok(())
}
