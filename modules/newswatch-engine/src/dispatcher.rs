use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use newswatch_common::{NewswatchError, WorkerJob};
use newswatch_store::EntityStore;

use crate::traits::WorkerLauncher;

/// Turns "process tenant X" into a bounded set of fire-and-forget worker
/// launches. Its responsibility ends at successful dispatch; completion is
/// the monitor's concern.
pub struct Dispatcher {
    store: Arc<dyn EntityStore>,
    launcher: Arc<dyn WorkerLauncher>,
    batch_size: usize,
}

/// What a dispatch call accomplished. Zero entities is a success with
/// nothing queued, not an error.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub batches_dispatched: usize,
    /// Launches that failed. One broken downstream never stops the rest.
    pub batches_failed: usize,
    pub entities_queued: usize,
}

impl DispatchOutcome {
    pub fn nothing_to_process(&self) -> bool {
        self.entities_queued == 0
    }
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn EntityStore>,
        launcher: Arc<dyn WorkerLauncher>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            launcher,
            batch_size,
        }
    }

    /// Dispatch one processing cycle for a tenant. Creates the tracking
    /// table lazily on first use; creation failure is fatal for the tenant.
    pub async fn dispatch(
        &self,
        tenant: &str,
        cycle: Uuid,
    ) -> Result<DispatchOutcome, NewswatchError> {
        if !self.store.table_exists(tenant).await? {
            info!(tenant, "No tracking table yet, creating");
            self.store.create_table(tenant).await?;
        }

        let names: Vec<String> = self
            .store
            .list_entities(tenant, false)
            .await?
            .into_iter()
            .map(|r| r.entity_name)
            .collect();

        if names.is_empty() {
            info!(tenant, "Nothing to process: no tracked entities");
            return Ok(DispatchOutcome::default());
        }

        let entities_queued = names.len();
        let batches = batch_names(names, self.batch_size);
        let mut outcome = DispatchOutcome {
            entities_queued,
            ..DispatchOutcome::default()
        };

        for batch in batches {
            let job = WorkerJob {
                tenant: tenant.to_string(),
                cycle,
                entities: batch,
            };
            match self.launcher.launch(job).await {
                Ok(()) => outcome.batches_dispatched += 1,
                Err(e) => {
                    warn!(tenant, error = %e, "Failed to launch worker batch");
                    outcome.batches_failed += 1;
                }
            }
        }

        info!(
            tenant,
            batches = outcome.batches_dispatched,
            failed = outcome.batches_failed,
            entities = outcome.entities_queued,
            "Dispatch complete"
        );
        Ok(outcome)
    }
}

/// Partition entity names into consecutive batches of at most `size`.
/// Input order is preserved, so the partition is deterministic for a given
/// listing.
pub fn batch_names(names: Vec<String>, size: usize) -> Vec<Vec<String>> {
    assert!(size > 0, "batch size must be positive");
    let mut batches = Vec::with_capacity(names.len().div_ceil(size));
    let mut current = Vec::with_capacity(size);
    for name in names {
        current.push(name);
        if current.len() == size {
            batches.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
