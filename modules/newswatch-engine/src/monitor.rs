use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use newswatch_common::{CompletionStatus, NewswatchError};
use newswatch_store::EntityStore;

/// Polls the store until every dispatched entity reports completion or the
/// attempt budget runs out. A deliberate sleep-poll: the store is scan-based
/// and has no change notifications, so polling trades a little latency for a
/// lot of simplicity. The wait is bounded by construction.
pub struct CompletionMonitor {
    store: Arc<dyn EntityStore>,
    interval: Duration,
    max_attempts: u32,
}

impl CompletionMonitor {
    pub fn new(store: Arc<dyn EntityStore>, interval: Duration, max_attempts: u32) -> Self {
        assert!(max_attempts > 0, "at least one poll attempt is required");
        Self {
            store,
            interval,
            max_attempts,
        }
    }

    /// Block until the tenant's fleet completes. Returns `Empty` right away
    /// for tenants with nothing tracked, and a `CompletionTimeout` carrying
    /// the last observed counts when the budget is exhausted.
    pub async fn wait(&self, tenant: &str) -> Result<CompletionStatus, NewswatchError> {
        let mut last = (0usize, 0usize);
        for attempt in 1..=self.max_attempts {
            match self.store.check_completion(tenant).await? {
                CompletionStatus::Empty => {
                    info!(tenant, "Nothing tracked, nothing to wait for");
                    return Ok(CompletionStatus::Empty);
                }
                status @ CompletionStatus::Complete { total } => {
                    info!(tenant, total, attempt, "All entities completed");
                    return Ok(status);
                }
                CompletionStatus::Pending { completed, total } => {
                    debug!(tenant, completed, total, attempt, "Still pending");
                    last = (completed, total);
                }
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        Err(NewswatchError::CompletionTimeout {
            completed: last.0,
            total: last.1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    use newswatch_common::EntityAnalysis;
    use newswatch_store::MemoryEntityStore;

    fn monitor(store: Arc<MemoryEntityStore>, attempts: u32) -> CompletionMonitor {
        CompletionMonitor::new(store, Duration::from_millis(5), attempts)
    }

    async fn seeded(entities: &[&str]) -> (Arc<MemoryEntityStore>, Uuid) {
        let store = Arc::new(MemoryEntityStore::new());
        store.create_table("acme").await.unwrap();
        let names: Vec<String> = entities.iter().map(|s| s.to_string()).collect();
        store.add_entities("acme", &names).await.unwrap();
        let cycle = Uuid::new_v4();
        store.clear_all("acme", cycle).await.unwrap();
        (store, cycle)
    }

    #[tokio::test]
    async fn empty_tenant_returns_immediately() {
        let store = Arc::new(MemoryEntityStore::new());
        store.create_table("acme").await.unwrap();

        let status = monitor(store, 3).wait("acme").await.unwrap();
        assert_eq!(status, CompletionStatus::Empty);
    }

    #[tokio::test]
    async fn completes_once_all_entities_are_done() {
        let (store, cycle) = seeded(&["A", "B"]).await;

        // Finish both entities from a background task while the monitor polls.
        let writer = Arc::clone(&store);
        tokio::spawn(async move {
            for name in ["A", "B"] {
                tokio::time::sleep(Duration::from_millis(10)).await;
                writer
                    .update_analysis("acme", name, cycle, &EntityAnalysis::new(vec![]), true)
                    .await
                    .unwrap();
            }
        });

        let status = monitor(store, 50).wait("acme").await.unwrap();
        assert_eq!(status, CompletionStatus::Complete { total: 2 });
    }

    #[tokio::test]
    async fn timeout_carries_last_observed_counts() {
        let (store, cycle) = seeded(&["A", "B", "C"]).await;
        store
            .update_analysis("acme", "A", cycle, &EntityAnalysis::new(vec![]), true)
            .await
            .unwrap();

        let err = monitor(store, 2).wait("acme").await.unwrap_err();
        match err {
            NewswatchError::CompletionTimeout { completed, total } => {
                assert_eq!(completed, 1);
                assert_eq!(total, 3);
            }
            other => panic!("expected timeout, got {other}"),
        }
    }
}
