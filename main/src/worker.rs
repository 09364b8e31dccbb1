mod app;
mod stubs;
mod tools;

use std::time::Duration;

use common::config::get_config;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const POLL_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;
    let state = app::AppState::build(config).await?;

    run_worker_loop(state).await
}

/// Polls every ingestion-capable handler on a fixed interval, re-indexing
/// each in turn and persisting its outcome to the registry state file
/// (SPEC_FULL.md §4.13, mirroring the teacher's `run_worker_loop`).
async fn run_worker_loop(state: app::AppState) -> Result<(), Box<dyn std::error::Error>> {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    loop {
        ticker.tick().await;
        for handler in state.registry.iter_ingestion_handlers() {
            let modality_id = handler.modality_id().to_string();
            match handler.ingest(None).await {
                Ok(counts) => {
                    info!(modality_id = %modality_id, items_seen = counts.items_seen, chunks_written = counts.chunks_written, errors = counts.errors, "ingestion cycle complete");
                    state.registry.update_state(&modality_id, None, Some(serde_json::json!(counts))).await;
                }
                Err(err) => {
                    warn!(modality_id = %modality_id, error = %err, "ingestion cycle failed");
                    state.registry.update_state(&modality_id, Some(err.to_string()), None).await;
                }
            }
        }
    }
}
