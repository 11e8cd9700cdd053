use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use newswatch_common::{CompletionStatus, NewswatchError};
use newswatch_store::EntityStore;

use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::monitor::CompletionMonitor;
use crate::report::{DeliveryOutcome, ReportAssembler};
use crate::traits::ReportSink;

/// End result of one full processing cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Tenant had no tracked entities; nothing was dispatched or reported.
    NothingToProcess,
    /// Digest assembled and delivered.
    Reported {
        dispatch: DispatchOutcome,
        delivery: DeliveryOutcome,
    },
}

/// Runs a complete cycle for a tenant: clear, dispatch, wait, report.
/// Fatal failures raise an operator alert before propagating — the operator
/// sees either a digest or a failure alert, never a silent no-op.
pub struct CycleRunner {
    store: Arc<dyn EntityStore>,
    dispatcher: Dispatcher,
    monitor: CompletionMonitor,
    assembler: ReportAssembler,
    sink: Arc<dyn ReportSink>,
    operator_email: String,
}

impl CycleRunner {
    pub fn new(
        store: Arc<dyn EntityStore>,
        dispatcher: Dispatcher,
        monitor: CompletionMonitor,
        assembler: ReportAssembler,
        sink: Arc<dyn ReportSink>,
        operator_email: String,
    ) -> Self {
        Self {
            store,
            dispatcher,
            monitor,
            assembler,
            sink,
            operator_email,
        }
    }

    pub async fn run(&self, tenant: &str) -> Result<CycleOutcome, NewswatchError> {
        match self.run_inner(tenant).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(tenant, error = %e, "Cycle failed, alerting operator");
                if let Err(alert_err) = self
                    .sink
                    .send_alert(&self.operator_email, &e.to_string())
                    .await
                {
                    warn!(error = %alert_err, "Failed to send operator alert");
                }
                Err(e)
            }
        }
    }

    async fn run_inner(&self, tenant: &str) -> Result<CycleOutcome, NewswatchError> {
        let cycle = Uuid::new_v4();
        info!(tenant, %cycle, "Starting processing cycle");

        // The reset must happen strictly before any worker of this cycle is
        // launched; the cycle token rejects stragglers from earlier cycles.
        if self.store.table_exists(tenant).await? {
            let cleared = self.store.clear_all(tenant, cycle).await?;
            info!(tenant, cleared = cleared.cleared, "Cleared previous cycle state");
        }

        let dispatch = self.dispatcher.dispatch(tenant, cycle).await?;
        if dispatch.nothing_to_process() {
            return Ok(CycleOutcome::NothingToProcess);
        }

        match self.monitor.wait(tenant).await? {
            CompletionStatus::Empty => return Ok(CycleOutcome::NothingToProcess),
            status => {
                info!(tenant, ?status, "Fleet completed, assembling report");
            }
        }

        let delivery = self.assembler.deliver(tenant).await?;
        info!(
            tenant,
            delivered = delivery.delivered.len(),
            failed = delivery.failed.len(),
            "Cycle complete"
        );
        Ok(CycleOutcome::Reported { dispatch, delivery })
    }
}
