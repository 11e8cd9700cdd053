use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use newswatch_common::WorkerJob;

use crate::traits::WorkerLauncher;
use crate::worker::Worker;

/// Fire-and-forget launcher that runs each batch on a spawned task — the
/// in-process analogue of asynchronously invoking a serverless worker. The
/// dispatcher gets its result back as soon as the task is spawned, not when
/// the batch finishes.
pub struct SpawnLauncher {
    worker: Arc<Worker>,
}

impl SpawnLauncher {
    pub fn new(worker: Arc<Worker>) -> Self {
        Self { worker }
    }
}

#[async_trait]
impl WorkerLauncher for SpawnLauncher {
    async fn launch(&self, job: WorkerJob) -> Result<()> {
        let worker = Arc::clone(&self.worker);
        info!(tenant = %job.tenant, entities = job.entities.len(), "Launching worker batch");
        tokio::spawn(async move {
            let outcome = worker.run(job).await;
            if !outcome.failed.is_empty() {
                warn!(
                    failed = outcome.failed.len(),
                    completed = outcome.completed.len(),
                    "Worker batch finished with failures"
                );
            }
        });
        Ok(())
    }
}
