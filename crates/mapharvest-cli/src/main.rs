//! mapharvest — entry point.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use mapharvest::config::{
    DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_NAVIGATION_TIMEOUT_MS, DEFAULT_OUTPUT_DIR,
    DEFAULT_QUIET_PERIOD_MS,
};
use mapharvest::{harvest, ChromiumRenderer, HarvestConfig, Renderer, TargetSite};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "mapharvest",
    about = "mapharvest — recover original sources from a site's leaked source maps",
    version
)]
struct Cli {
    /// Target URL, including the protocol (http:// or https://).
    #[arg(long, value_parser = parse_target)]
    url: TargetSite,

    /// Record a video of the browser session into screenRecordings/.
    #[arg(long)]
    record: bool,

    /// Root directory of the reconstructed mirror.
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    out: PathBuf,

    /// Hard navigation timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_NAVIGATION_TIMEOUT_MS)]
    timeout: u64,

    /// Wait after the page settles, in milliseconds, to catch lazy resources.
    #[arg(long, default_value_t = DEFAULT_QUIET_PERIOD_MS)]
    quiet_period: u64,

    /// Per-request fetch timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_MS)]
    fetch_timeout: u64,

    /// Chromium/Chrome binary to drive. Defaults to $MAPHARVEST_CHROMIUM_PATH,
    /// then the usual names on PATH.
    #[arg(long)]
    chromium: Option<PathBuf>,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn parse_target(raw: &str) -> Result<TargetSite, String> {
    TargetSite::parse(raw).map_err(|e| e.to_string())
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = HarvestConfig::new(cli.url);
    config.output_root = cli.out;
    config.navigation_timeout = Duration::from_millis(cli.timeout);
    config.quiet_period = Duration::from_millis(cli.quiet_period);
    config.fetch_timeout = Duration::from_millis(cli.fetch_timeout);
    config.record = cli.record;
    config.chromium_path = cli.chromium;

    tracing::info!(site = %config.site, out = %config.output_root.display(), "starting harvest");

    let renderer = ChromiumRenderer::launch(config.chromium_path.as_deref())
        .await
        .context("could not start the browser")?;

    let result = harvest(&config, &renderer).await;
    if let Err(e) = renderer.shutdown().await {
        tracing::warn!(error = %format!("{e:#}"), "browser did not shut down cleanly");
    }
    let report = result?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    if let Err(e) = run(cli).await {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }
}
