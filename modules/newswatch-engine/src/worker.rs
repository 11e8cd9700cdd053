use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{info, warn};
use uuid::Uuid;

use newswatch_common::{
    ArticleAnalysis, EntityAnalysis, NewswatchError, ScoredArticle, WorkerJob,
};
use newswatch_store::EntityStore;

use crate::traits::{ArticleScorer, ArticleSource};

/// Recency window for the article search.
const SEARCH_WINDOW_HOURS: u32 = 48;
/// Cap on articles per entity.
const MAX_ARTICLES: usize = 10;
/// Bounded concurrency for per-article scoring within one entity.
const SCORE_CONCURRENCY: usize = 4;
/// Attempts for the final persist, the only entity-level fatal step.
const PERSIST_ATTEMPTS: u32 = 3;

/// Processes entities end-to-end: search, score, persist. One worker handles
/// the entities of its job independently; it never touches another entity's
/// record.
pub struct Worker {
    store: Arc<dyn EntityStore>,
    source: Arc<dyn ArticleSource>,
    scorer: Arc<dyn ArticleScorer>,
}

#[derive(Debug)]
pub struct EntityOutcome {
    pub entity: String,
    pub articles_found: usize,
    pub important_articles: usize,
}

#[derive(Debug, Default)]
pub struct WorkerOutcome {
    pub completed: Vec<EntityOutcome>,
    pub failed: Vec<(String, String)>,
}

impl Worker {
    pub fn new(
        store: Arc<dyn EntityStore>,
        source: Arc<dyn ArticleSource>,
        scorer: Arc<dyn ArticleScorer>,
    ) -> Self {
        Self {
            store,
            source,
            scorer,
        }
    }

    /// Process every entity in the job. A failure for one entity is recorded
    /// and the rest still run.
    pub async fn run(&self, job: WorkerJob) -> WorkerOutcome {
        let mut outcome = WorkerOutcome::default();
        for entity in &job.entities {
            match self.process_entity(&job.tenant, job.cycle, entity).await {
                Ok(done) => outcome.completed.push(done),
                Err(e) => {
                    warn!(entity = %entity, error = %e, "Entity processing failed");
                    outcome.failed.push((entity.clone(), e.to_string()));
                }
            }
        }
        outcome
    }

    /// Search, score, and persist one entity.
    pub async fn process_entity(
        &self,
        tenant: &str,
        cycle: Uuid,
        entity: &str,
    ) -> Result<EntityOutcome, NewswatchError> {
        // Source failure means zero articles for this cycle, not entity
        // failure.
        let articles = match self
            .source
            .search(entity, SEARCH_WINDOW_HOURS, MAX_ARTICLES)
            .await
        {
            Ok(articles) => articles,
            Err(e) => {
                warn!(entity, error = %e, "Search failed, treating as zero articles");
                Vec::new()
            }
        };

        // Bounded-concurrency scoring; `buffered` preserves source order so
        // the later stable sort is deterministic.
        let mut scored: Vec<ScoredArticle> = futures::stream::iter(articles)
            .map(|article| {
                let scorer = Arc::clone(&self.scorer);
                let tenant = tenant.to_string();
                let entity = entity.to_string();
                async move {
                    let text = format!("{} {}", article.title, article.snippet);
                    let analysis = match scorer.score(&text, &entity, Some(&tenant)).await {
                        Ok(a) => a,
                        Err(e) => {
                            warn!(entity = %entity, title = %article.title, error = %e,
                                "Scoring failed, recording placeholder");
                            ArticleAnalysis::failed()
                        }
                    };
                    ScoredArticle { article, analysis }
                }
            })
            .buffered(SCORE_CONCURRENCY)
            .collect()
            .await;

        // Important articles first; stable, so ties keep source order.
        scored.sort_by_key(|a| !a.analysis.important);

        let articles_found = scored.len();
        let important_articles = scored.iter().filter(|a| a.analysis.important).count();
        let analysis = EntityAnalysis::new(scored);

        self.persist(tenant, cycle, entity, &analysis).await?;

        info!(entity, articles_found, important_articles, "Entity completed");
        Ok(EntityOutcome {
            entity: entity.to_string(),
            articles_found,
            important_articles,
        })
    }

    /// Persist with bounded retries. Exhausted retries leave the entity
    /// pending for the monitor to observe, never silently vanished. A stale
    /// cycle rejection is final: the fleet has moved on without us.
    async fn persist(
        &self,
        tenant: &str,
        cycle: Uuid,
        entity: &str,
        analysis: &EntityAnalysis,
    ) -> Result<(), NewswatchError> {
        let mut last_err = None;
        for attempt in 1..=PERSIST_ATTEMPTS {
            match self
                .store
                .update_analysis(tenant, entity, cycle, analysis, true)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e @ NewswatchError::StaleWrite { .. }) => return Err(e),
                Err(e) => {
                    warn!(entity, attempt, error = %e, "Persist failed");
                    last_err = Some(e);
                    if attempt < PERSIST_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                    }
                }
            }
        }
        Err(last_err.expect("at least one persist attempt"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use newswatch_common::Sentiment;
    use newswatch_store::MemoryEntityStore;

    use crate::testing::{article, MockScorer, MockSource};

    async fn seeded_store(entities: &[&str]) -> (Arc<MemoryEntityStore>, Uuid) {
        let store = Arc::new(MemoryEntityStore::new());
        store.create_table("acme").await.unwrap();
        let names: Vec<String> = entities.iter().map(|s| s.to_string()).collect();
        store.add_entities("acme", &names).await.unwrap();
        let cycle = Uuid::new_v4();
        store.clear_all("acme", cycle).await.unwrap();
        (store, cycle)
    }

    #[tokio::test]
    async fn important_articles_sort_first_preserving_source_order() {
        let (store, cycle) = seeded_store(&["A"]).await;
        let source = Arc::new(MockSource::new().on_search(
            "A",
            vec![article("first"), article("second"), article("third")],
        ));
        // importance [true, false, true] — persisted order must be
        // [first, third, second].
        let scorer = Arc::new(
            MockScorer::new()
                .important_for("first")
                .important_for("third"),
        );
        let worker = Worker::new(store.clone(), source, scorer);

        let outcome = worker.process_entity("acme", cycle, "A").await.unwrap();
        assert_eq!(outcome.articles_found, 3);
        assert_eq!(outcome.important_articles, 2);

        let records = store.list_entities("acme", true).await.unwrap();
        let titles: Vec<_> = records[0]
            .analysis
            .as_ref()
            .unwrap()
            .articles
            .iter()
            .map(|a| a.article.title.clone())
            .collect();
        assert_eq!(titles, vec!["first", "third", "second"]);
    }

    #[tokio::test]
    async fn scorer_failure_records_placeholder_not_omission() {
        let (store, cycle) = seeded_store(&["A"]).await;
        let source = Arc::new(MockSource::new().on_search(
            "A",
            vec![article("ok-1"), article("broken"), article("ok-2")],
        ));
        let scorer = Arc::new(MockScorer::new().fail_for("broken"));
        let worker = Worker::new(store.clone(), source, scorer);

        let outcome = worker.process_entity("acme", cycle, "A").await.unwrap();
        assert_eq!(outcome.articles_found, 3);

        let records = store.list_entities("acme", true).await.unwrap();
        let articles = &records[0].analysis.as_ref().unwrap().articles;
        assert_eq!(articles.len(), 3);
        let broken = articles
            .iter()
            .find(|a| a.article.title == "broken")
            .unwrap();
        assert_eq!(broken.analysis.sentiment, Sentiment::Failed);
        assert!(!broken.analysis.important);
        assert_eq!(broken.analysis.summary, "Analysis failed");
    }

    #[tokio::test]
    async fn source_failure_completes_entity_with_zero_articles() {
        let (store, cycle) = seeded_store(&["A"]).await;
        let source = Arc::new(MockSource::new().fail_search("A"));
        let scorer = Arc::new(MockScorer::new());
        let worker = Worker::new(store.clone(), source, scorer);

        let outcome = worker.process_entity("acme", cycle, "A").await.unwrap();
        assert_eq!(outcome.articles_found, 0);

        let records = store.list_entities("acme", true).await.unwrap();
        assert!(records[0].completed);
        assert!(records[0].analysis.as_ref().unwrap().articles.is_empty());
    }

    #[tokio::test]
    async fn persist_retries_transient_store_failures() {
        let (store, cycle) = seeded_store(&["A"]).await;
        store.fail_next_updates(2);
        let source = Arc::new(MockSource::new().on_search("A", vec![article("a1")]));
        let worker = Worker::new(store.clone(), source, Arc::new(MockScorer::new()));

        worker.process_entity("acme", cycle, "A").await.unwrap();
        let records = store.list_entities("acme", false).await.unwrap();
        assert!(records[0].completed);
    }

    #[tokio::test]
    async fn exhausted_persist_retries_leave_entity_pending() {
        let (store, cycle) = seeded_store(&["A"]).await;
        store.fail_next_updates(PERSIST_ATTEMPTS);
        let source = Arc::new(MockSource::new().on_search("A", vec![article("a1")]));
        let worker = Worker::new(store.clone(), source, Arc::new(MockScorer::new()));

        let err = worker.process_entity("acme", cycle, "A").await.unwrap_err();
        assert!(matches!(err, NewswatchError::Store(_)));

        // Still pending, visible to the monitor rather than silently gone.
        let records = store.list_entities("acme", false).await.unwrap();
        assert!(!records[0].completed);
    }

    #[tokio::test]
    async fn stale_cycle_is_not_retried() {
        let (store, _old) = seeded_store(&["A"]).await;
        let current = Uuid::new_v4();
        store.clear_all("acme", current).await.unwrap();

        let source = Arc::new(MockSource::new().on_search("A", vec![article("a1")]));
        let worker = Worker::new(store.clone(), source, Arc::new(MockScorer::new()));

        // Worker still holds the superseded cycle token.
        let stale = Uuid::new_v4();
        let err = worker.process_entity("acme", stale, "A").await.unwrap_err();
        assert!(matches!(err, NewswatchError::StaleWrite { .. }));
    }

    #[tokio::test]
    async fn one_failed_entity_does_not_abort_the_batch() {
        let (store, cycle) = seeded_store(&["A", "B"]).await;
        let source = Arc::new(
            MockSource::new()
                .on_search("A", vec![article("a1")])
                .on_search("B", vec![article("b1")]),
        );
        let worker = Worker::new(store.clone(), source, Arc::new(MockScorer::new()));

        // First persist (entity A) fails through all attempts; B succeeds.
        store.fail_next_updates(PERSIST_ATTEMPTS);
        let outcome = worker
            .run(WorkerJob {
                tenant: "acme".to_string(),
                cycle,
                entities: vec!["A".to_string(), "B".to_string()],
            })
            .await;

        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, "A");
        assert_eq!(outcome.completed.len(), 1);
        assert_eq!(outcome.completed[0].entity, "B");
    }
}
