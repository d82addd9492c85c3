/// frostmon: batch frost risk report for an hourly CIMIS document.
///
/// Reads a JSON document already fetched from the weather store, runs the
/// frost risk pipeline, and prints the daily summaries as JSON.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use frostmon_service::config::FrostConfig;
use frostmon_service::ingest::cimis::parse_document;
use frostmon_service::logging;
use frostmon_service::pipeline::run_pipeline;

/// Almond frost risk from hourly weather observations
#[derive(Parser)]
#[command(name = "frostmon")]
#[command(version, about, long_about = None)]
struct Cli {
    /// CIMIS-style hourly JSON document
    document: PathBuf,

    /// Config file (defaults to ./frostmon.toml when present)
    #[arg(long, short, env = "FROSTMON_CONFIG")]
    config: Option<PathBuf>,

    /// Station to report on; repeat for several. Overrides the config.
    #[arg(long = "station", short)]
    stations: Vec<String>,

    /// First date to include (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last date to include (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Orchard canopy offset in °C
    #[arg(long)]
    delta_orchard: Option<f64>,

    /// Include hourly records in the output
    #[arg(long)]
    hourly: bool,

    /// Enrich stations in parallel
    #[arg(long)]
    parallel: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = FrostConfig::load(cli.config.as_deref()).context("loading configuration")?;
    logging::init_logger(
        config.log_level()?,
        config.logging.log_file.as_deref(),
        config.logging.timestamps,
    )
    .context("opening log file")?;

    let mut request = config.to_request()?;
    if !cli.stations.is_empty() {
        request.query.stations = cli.stations.clone();
    }
    if cli.start.is_some() {
        request.query.start_date = cli.start;
    }
    if cli.end.is_some() {
        request.query.end_date = cli.end;
    }
    if let Some(delta) = cli.delta_orchard {
        request.delta_orchard_c = delta;
    }
    request.parallel = cli.parallel;

    let text = std::fs::read_to_string(&cli.document)
        .with_context(|| format!("reading {}", cli.document.display()))?;
    let document = parse_document(&text)?;

    info!(
        stations = ?request.query.stations,
        crop = %request.crop,
        "computing frost risk for {}",
        cli.document.display()
    );
    let report = run_pipeline(&document, &request)?;

    let output = if cli.hourly {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string_pretty(&report.daily)?
    };
    println!("{}", output);
    Ok(())
}
