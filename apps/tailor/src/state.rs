use std::sync::Arc;

use crate::config::Config;
use crate::ledger::StatusLedger;
use crate::pipeline::TailorPipeline;
use crate::queue::JobQueue;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: TailorPipeline,
    pub ledger: Arc<dyn StatusLedger>,
    pub queue: Arc<dyn JobQueue>,
    pub config: Config,
}

impl AppState {
    pub fn new(queue: Arc<dyn JobQueue>, ledger: Arc<dyn StatusLedger>, config: Config) -> Self {
        Self {
            pipeline: TailorPipeline::new(queue.clone(), ledger.clone()),
            ledger,
            queue,
            config,
        }
    }
}
