use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use netwatch::{
    config::read_config_file, signals::ShutdownSignals, supervisor::Supervisor,
    util::get_config_path,
};
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Continuous multi-target liveness monitor")]
struct Args {
    /// Config file (defaults to $NETWATCH_CONFIG or ./netwatch.json)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Log everything down to trace level
    #[arg(short, long)]
    verbose: bool,

    /// Also append plain-text logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init(args: &Args) -> anyhow::Result<()> {
    let level = if args.verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };
    let filter = filter::Targets::new().with_targets(vec![("netwatch", level)]);

    let file_layer = match &args.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(file_layer)
        .with(filter)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(&args)?;
    trace!("started with args: {args:?}");

    let path = args.file.clone().unwrap_or_else(get_config_path);
    let config = read_config_file(&path)?;
    info!("loaded {} target(s) from {}", config.targets.len(), path.display());

    let mut supervisor = Supervisor::from_config(&config).await?;

    let signals =
        ShutdownSignals::register().context("failed to install shutdown signal handlers")?;

    supervisor.run_until(signals.wait()).await?;

    Ok(())
}
