//! Watches the portal for newly saved sources and mirrors a folder for each
//! on the ownCloud WebDAV store.

use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use log::LevelFilter;
use portal_app::config::{load_env_file, parse_start_time, WatcherConfig};
use portal_app::platform::logging::{self, LogDestination};
use portal_app::platform::slack::SlackLogger;
use portal_engine::{FetchSettings, ReqwestPortal, Watcher, WebDavClient};
use portal_logging::{portal_error, portal_info, portal_warn};

#[derive(Debug, Parser)]
#[command(
    version,
    about = "Auto-create ownCloud folders for new portal sources",
    after_help = "Examples:\n  source_watcher --env-file .env.local\n  source_watcher --start-time 2025-05-15T00:00:00Z"
)]
struct Cli {
    /// Path to the .env configuration file.
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,
    /// Start of the first poll window; overrides START_TIME.
    #[arg(long)]
    start_time: Option<String>,
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
    // Load before logging so the Slack token is known when the logger is built.
    let env_loaded = load_env_file(&cli.env_file);
    let config = WatcherConfig::from_env();

    let slack = config
        .as_ref()
        .ok()
        .and_then(|config| config.slack.clone())
        .and_then(|settings| match SlackLogger::new(settings) {
            Ok(logger) => Some(logger),
            Err(err) => {
                eprintln!("Warning: Slack logging unavailable: {err}");
                None
            }
        });
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    logging::initialize(LogDestination::from_log_file(cli.log_file.clone()), level, slack);

    match env_loaded {
        Ok(true) => portal_info!("Loaded configuration from {}", cli.env_file.display()),
        Ok(false) => portal_warn!(".env file not found at {}", cli.env_file.display()),
        Err(err) => return Err(err).context(format!("reading {}", cli.env_file.display())),
    }
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            portal_error!("Configuration error: {}", err);
            portal_error!(
                "Required variables: OWNCLOUD_USERNAME, OWNCLOUD_TOKEN, OWNCLOUD_USER_ID, SKYPORTAL_TOKEN"
            );
            return Err(err.into());
        }
    };
    let start_time = match cli.start_time.as_deref() {
        Some(value) => parse_start_time(value).context("invalid --start-time")?,
        None => config.start_time_or(Utc::now()),
    };

    let fetch = FetchSettings::default();
    let portal = ReqwestPortal::new(&config.api_root(), &config.skyportal_token, &fetch)?;
    let store = WebDavClient::new(&config.owncloud, &fetch)?;

    portal_info!(
        "Watching groups {:?} for sources saved after {}",
        config.group_ids,
        start_time.to_rfc3339()
    );
    Watcher::new(&portal, &store, config.watcher_settings(), start_time)
        .run()
        .await;
    Ok(())
}
