//! verdict-feed - trial verdict feed watcher and sheet publisher
//!
//! `watch` polls the feed and renders defendant blocks into an HTML file
//! (or stdout). `publish` turns a spreadsheet CSV export into the feed's
//! JSON/JSONP/CSV flatfiles.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tracing::info;
use verdict_common::config::ConfigResolver;
use verdict_common::logging::init_tracing;
use verdict_feed::aggregator::{log_report, Aggregator};
use verdict_feed::publish::{publish_file, Filter, PublishOptions};
use verdict_feed::settings::{FeedConfig, Overrides, Settings};
use verdict_feed::target::{HtmlFileTarget, RenderTarget, StdoutTarget};
use verdict_feed::{FeedClient, FeedFormat, FeedProfile};

/// Command-line arguments for verdict-feed
#[derive(Parser, Debug)]
#[command(name = "verdict-feed")]
#[command(about = "Trial verdict feed watcher and sheet publisher")]
#[command(version)]
struct Cli {
    /// Config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the feed and render defendant blocks
    Watch(WatchArgs),
    /// Publish a spreadsheet CSV export as feed flatfiles
    Publish(PublishArgs),
}

#[derive(Args, Debug)]
struct WatchArgs {
    /// Base URL the slices are served from
    #[arg(long, env = "VERDICT_BASE_URL")]
    base_url: Option<String>,

    /// Deployment profile
    #[arg(long, value_enum, env = "VERDICT_PROFILE")]
    profile: Option<FeedProfile>,

    /// Slice payload format
    #[arg(long, value_enum, env = "VERDICT_FORMAT")]
    format: Option<FeedFormat>,

    /// Refresh interval in seconds
    #[arg(long, env = "VERDICT_REFRESH_SECS")]
    refresh_secs: Option<u64>,

    /// HTML output file (stdout if omitted)
    #[arg(short, long, env = "VERDICT_OUTPUT")]
    output: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[derive(Args, Debug)]
struct PublishArgs {
    /// CSV export of the worksheet
    #[arg(short, long)]
    input: PathBuf,

    /// Worksheet name (e.g. numeric, by-victim, config)
    #[arg(short, long)]
    sheet: String,

    /// Output directory
    #[arg(long, default_value = "output")]
    out_dir: PathBuf,

    /// Publish only rows matching key=value (repeatable)
    #[arg(short, long = "filter")]
    filters: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let resolver = ConfigResolver::new("verdict-feed");
    let (config, config_path): (FeedConfig, _) = resolver
        .load(cli.config.as_deref())
        .context("Failed to load configuration")?;

    init_tracing(&config.logging).context("Failed to initialize logging")?;

    info!(
        "Starting verdict-feed v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file, using defaults"),
    }

    match cli.command {
        Command::Watch(args) => watch(config, args).await,
        Command::Publish(args) => publish(args),
    }
}

async fn watch(config: FeedConfig, args: WatchArgs) -> Result<()> {
    let overrides = Overrides {
        base_url: args.base_url,
        profile: args.profile,
        format: args.format,
        refresh_secs: args.refresh_secs,
        output: args.output,
    };
    let settings = Settings::resolve(&config, &overrides).context("Invalid settings")?;
    let client = FeedClient::new(&settings.base_url, settings.format, settings.request_timeout)
        .context("Failed to build HTTP client")?;

    match settings.output.clone() {
        Some(path) => {
            info!("Rendering to {}", path.display());
            run(Aggregator::new(client, settings, HtmlFileTarget::new(path)), args.once).await
        }
        None => run(Aggregator::new(client, settings, StdoutTarget::new()), args.once).await,
    }
}

async fn run<T: RenderTarget>(mut aggregator: Aggregator<T>, once: bool) -> Result<()> {
    if once {
        let report = aggregator.run_cycle().await.context("Cycle failed")?;
        log_report(&report);
        if !report.rendered() {
            bail!("Cycle {} did not render: {:?}", report.cycle, report.outcome);
        }
        return Ok(());
    }

    aggregator.watch(shutdown_signal()).await;
    Ok(())
}

fn publish(args: PublishArgs) -> Result<()> {
    let filters = args
        .filters
        .iter()
        .map(|f| f.parse::<Filter>())
        .collect::<Result<Vec<_>, _>>()?;

    let options = PublishOptions {
        sheet: args.sheet,
        out_dir: args.out_dir,
        filters,
    };
    let summary = publish_file(&args.input, &options)
        .with_context(|| format!("Failed to publish {}", args.input.display()))?;

    for file in &summary.files {
        info!("Wrote {}", file.display());
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
