// Trait abstractions for the engine's external collaborators.
//
// ArticleSource — search provider returning candidate articles.
// ArticleScorer — sentiment/relevance/importance engine. Constructed once at
//   process start and injected, never a hidden module-level singleton.
// ReportSink — outbound delivery of digests and operator alerts.
// WorkerLauncher — fire-and-forget hand-off of a batch to a worker; the
//   dispatcher's responsibility ends at a successful launch.
//
// Each has mocks in `testing.rs`; tests run with no network and no database.

use anyhow::Result;
use async_trait::async_trait;

use newswatch_common::{Article, ArticleAnalysis, WorkerJob};

use crate::report::RenderedReport;

#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Candidate articles for an entity within the recency window, capped at
    /// `max_results`. A transient failure is the caller's to absorb.
    async fn search(
        &self,
        entity: &str,
        window_hours: u32,
        max_results: usize,
    ) -> Result<Vec<Article>>;
}

#[async_trait]
pub trait ArticleScorer: Send + Sync {
    /// Score one article's text for an entity. `parent_context` is the
    /// tenant name, used in the importance escalation criterion.
    async fn score(
        &self,
        article_text: &str,
        entity: &str,
        parent_context: Option<&str>,
    ) -> Result<ArticleAnalysis>;
}

#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Deliver a rendered digest to one recipient. Returns a message id.
    async fn send(&self, recipient: &str, report: &RenderedReport) -> Result<String>;

    /// Deliver an operator failure alert, distinct from the regular digest.
    async fn send_alert(&self, recipient: &str, error: &str) -> Result<()>;
}

#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    /// Hand a batch to a worker without waiting for its result.
    async fn launch(&self, job: WorkerJob) -> Result<()>;
}
