use std::sync::Arc;

use actors::{DbQueueStore, JobRunner, Scheduler};
use baseline::BaselineBackend;
use forecastd::DaemonConfig;
use storage::Storage;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = DaemonConfig::from_env()?;
    tracing::info!(
        mode = config.mode.as_str(),
        interval = ?config.scheduler.interval,
        stale_after = ?config.scheduler.stale_after,
        "starting forecastd"
    );

    db::init(config.db.clone()).await?;

    let mut backend = BaselineBackend::from_database();
    if let Some(storage_config) = config.storage.clone() {
        let storage = Storage::new(storage_config).await?;
        tracing::info!(kind = storage.kind().as_str(), "writing debug artifacts");
        backend = backend.with_artifacts(storage);
    }

    let runner = JobRunner::new(Arc::new(DbQueueStore), Arc::new(backend));
    let scheduler = Scheduler::start(runner, config.scheduler.clone()).await?;

    let mut events = scheduler.subscribe();
    let listener = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::debug!(scan_id = %event.scan_id(), "{}", event.description()),
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "event listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupted, stopping scheduler");

    scheduler.shutdown().await?;
    listener.abort();

    tracing::info!("forecastd stopped");
    Ok(())
}
