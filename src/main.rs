use anyhow::Context;
use clap::Parser;
use site_blocker::adapters::stdio;
use site_blocker::utils::logger;
use site_blocker::{AppConfig, CliConfig, Coordinator, FileStorage, SystemClock};
use std::sync::Arc;
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("🚀 Starting site-blocker coordinator");

    let config = AppConfig::resolve(&cli).context("invalid configuration")?;
    tracing::debug!("Resolved config: {:?}", config);

    let storage = FileStorage::open(&config.data_dir)
        .await
        .with_context(|| format!("cannot open data dir {}", config.data_dir.display()))?;
    tracing::info!("📁 Persisting to {}", storage.path().display());

    let coordinator =
        Coordinator::start(storage, Arc::new(SystemClock), config.coordinator.clone()).await;

    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();

    tokio::select! {
        result = stdio::serve(coordinator.clone(), reader, writer) => {
            result.context("transport failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
        }
    }

    coordinator.shutdown();
    Ok(())
}
