//! EPI Ingest - snapshot ingestion run

use anyhow::Result;
use clap::Parser;
use epi_common::logging::{init_logging, LogConfig};
use epi_ingest::fetcher::CachedFetcher;
use epi_ingest::sources::SourceCatalog;
use epi_ingest::{IngestConfig, IngestPipeline, SnapshotPublisher};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "epi-ingest")]
#[command(about = "Fetch case and intervention data and publish it as one snapshot")]
struct Cli {
    /// Directory for cached downloads and JSON artifacts; omit to always
    /// download and skip the artifacts
    cache_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env_with(
        LogConfig::default()
            .with_file_prefix("epi-ingest")
            .with_filter_directives("sqlx=warn"),
    )?;
    let _guard = init_logging(&log_config)?;

    match run(cli).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!(error = %format!("{:#}", e), "Ingestion failed");
            Ok(ExitCode::FAILURE)
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = IngestConfig::from_env()?;
    info!(
        host = %config.database.host,
        database = %config.database.database,
        cache_dir = ?cli.cache_dir,
        "Starting ingestion run"
    );

    let fetcher = CachedFetcher::new(&config.fetch, cli.cache_dir)?;
    let pipeline = IngestPipeline::new(SourceCatalog::default(), fetcher, config.fetch.concurrency);
    let publisher = SnapshotPublisher::new(config.database.pool(), &config.publish);

    let outcome = pipeline.run(&publisher).await;
    publisher.pool().close().await;

    outcome?;
    Ok(())
}
