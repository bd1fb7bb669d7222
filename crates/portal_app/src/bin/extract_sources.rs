//! Batch extraction: pages through the configured groups, enriches every source
//! and writes one CSV table per run.

use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use log::LevelFilter;
use portal_app::config::{load_env_file, ExtractorConfig};
use portal_app::platform::logging::{self, LogDestination};
use portal_core::{Cosmology, Deriver, ExtinctionLookup};
use portal_engine::{
    ensure_dust_maps, write_table, Extractor, FetchSettings, ReqwestFetcher, ReqwestPortal,
};
use portal_logging::{portal_info, portal_warn};

#[derive(Debug, Parser)]
#[command(version, about = "Extract enriched portal sources into a CSV table")]
struct Cli {
    /// Path to the .env configuration file.
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,
    /// Directory receiving data_extraction_<timestamp>.csv.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
    /// Also append logs to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    logging::initialize(LogDestination::from_log_file(cli.log_file.clone()), level, None);

    match load_env_file(&cli.env_file) {
        Ok(true) => portal_info!("Loaded configuration from {}", cli.env_file.display()),
        Ok(false) => portal_warn!(".env file not found at {}", cli.env_file.display()),
        Err(err) => return Err(err).context(format!("reading {}", cli.env_file.display())),
    }
    let config = ExtractorConfig::from_env().context("configuration error")?;
    let started = Local::now();

    let fetcher = ReqwestFetcher::new(FetchSettings::for_large_files())?;
    match ensure_dust_maps(&fetcher, &config.dustmaps_base_url, &config.dustmaps_dir).await {
        Ok(written) if !written.is_empty() => {
            portal_info!("Downloaded {} dust map files", written.len())
        }
        Ok(_) => {}
        Err(err) => portal_warn!("Could not download SFD dust maps: {}", err),
    }
    let extinction = ExtinctionLookup::load(&config.dustmaps_dir);
    if extinction.is_enabled() {
        portal_info!("E(B-V) enabled from {}", config.dustmaps_dir.display());
    } else {
        portal_warn!("E(B-V) column will be empty: no usable dust maps");
    }
    let deriver = Deriver::new(extinction, Cosmology::planck18());

    let portal = ReqwestPortal::new(&config.base_url, &config.api_token, &FetchSettings::default())?;
    let settings = config.extraction_settings();
    let report = Extractor::new(&portal, &deriver, &settings).run().await;

    let exhausted: Vec<_> = report.exhausted_groups().collect();
    if !exhausted.is_empty() {
        portal_warn!("Groups abandoned after repeated errors: {:?}", exhausted);
    }

    let path = write_table(&cli.output_dir, &report.rows, started)
        .with_context(|| format!("writing table to {}", cli.output_dir.display()))?;
    portal_info!(
        "Extraction finished: {} sources from {} groups in {}",
        report.rows.len(),
        report.groups.len(),
        path.display()
    );
    Ok(())
}
