mod config;
mod errors;
mod ledger;
mod llm_client;
mod models;
mod pipeline;
mod queue;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::ledger::{InMemoryLedger, RedisLedger, StatusLedger};
use crate::llm_client::{GeminiClient, GenerationClient};
use crate::pipeline::{Stage, StageProcessor};
use crate::queue::{InMemoryQueue, JobQueue, RedisQueue, StageWorker};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor v{}", env!("CARGO_PKG_VERSION"));

    // Redis backs both the job queues and the status ledger when configured
    let (queue, ledger) = match config.redis_url.as_deref() {
        Some(url) => {
            let redis = redis::Client::open(url)?;
            let queue: Arc<dyn JobQueue> = Arc::new(RedisQueue::connect(&redis).await?);
            let ledger: Arc<dyn StatusLedger> =
                Arc::new(RedisLedger::connect(&redis, config.ledger_ttl_secs).await?);
            info!("Redis connected");
            (queue, ledger)
        }
        None => {
            let queue: Arc<dyn JobQueue> = Arc::new(InMemoryQueue::new());
            let ledger: Arc<dyn StatusLedger> = Arc::new(InMemoryLedger::new(
                Duration::from_secs(config.ledger_ttl_secs),
            ));
            warn!("REDIS_URL not set, using in-process queues and ledger (lost on restart)");
            (queue, ledger)
        }
    };

    let llm: Arc<dyn GenerationClient> = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        config.generation_base_url.clone(),
        Duration::from_secs(config.generation_timeout_secs),
    )?);
    info!("Generation client initialized (model: {})", config.generation_model);

    let processor = Arc::new(
        StageProcessor::new(
            llm,
            ledger.clone(),
            queue.clone(),
            config.generation_model.clone(),
        )
        .with_reprompt_attempts(config.reprompt_attempts),
    );

    // Stage workers
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poll_interval = Duration::from_millis(config.queue_poll_interval_ms);
    let mut workers = Vec::new();
    for stage in Stage::all() {
        for _ in 0..config.worker_concurrency.max(1) {
            let worker = StageWorker::new(stage, queue.clone(), processor.clone(), poll_interval);
            workers.push(tokio::spawn(worker.run(shutdown_rx.clone())));
        }
    }
    info!(
        "Spawned {} stage workers ({} per stage)",
        workers.len(),
        config.worker_concurrency.max(1)
    );

    let state = AppState::new(queue, ledger, config.clone());

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let in-flight stage jobs finish before exiting
    info!("Shutting down stage workers");
    shutdown_tx.send(true).ok();
    for worker in workers {
        worker.await.ok();
    }
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
