//! Test mocks for the engine's trait boundaries.
//!
//! Four mocks matching the four seams:
//! - MockSource (ArticleSource) — HashMap-based entity→articles
//! - MockScorer (ArticleScorer) — title-keyed importance and failure sets
//! - RecordingSink (ReportSink) — records deliveries, injectable failures
//! - RecordingLauncher / InlineLauncher (WorkerLauncher)
//!
//! Together with the in-memory store these make every pipeline test
//! hermetic: no network, no database.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use newswatch_common::{Article, ArticleAnalysis, Sentiment, WorkerJob};

use crate::report::RenderedReport;
use crate::traits::{ArticleScorer, ArticleSource, ReportSink, WorkerLauncher};
use crate::worker::Worker;

/// Shorthand for a test article whose url and snippet derive from the title.
pub fn article(title: &str) -> Article {
    Article {
        title: title.to_string(),
        url: format!("https://example.com/{title}"),
        snippet: format!("snippet for {title}"),
    }
}

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// HashMap-based article source. Unregistered entities get zero articles;
/// entities in the failure set error.
#[derive(Default)]
pub struct MockSource {
    results: HashMap<String, Vec<Article>>,
    failures: HashSet<String>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_search(mut self, entity: &str, articles: Vec<Article>) -> Self {
        self.results.insert(entity.to_string(), articles);
        self
    }

    pub fn fail_search(mut self, entity: &str) -> Self {
        self.failures.insert(entity.to_string());
        self
    }
}

#[async_trait]
impl ArticleSource for MockSource {
    async fn search(
        &self,
        entity: &str,
        _window_hours: u32,
        max_results: usize,
    ) -> Result<Vec<Article>> {
        if self.failures.contains(entity) {
            return Err(anyhow!("MockSource: injected failure for {entity}"));
        }
        Ok(self
            .results
            .get(entity)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .take(max_results)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MockScorer
// ---------------------------------------------------------------------------

/// Scores every article neutral/unimportant unless its title is registered
/// as important; titles in the failure set error instead.
#[derive(Default)]
pub struct MockScorer {
    important_titles: HashSet<String>,
    fail_titles: HashSet<String>,
}

impl MockScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark any article whose text contains `title` as important.
    pub fn important_for(mut self, title: &str) -> Self {
        self.important_titles.insert(title.to_string());
        self
    }

    /// Fail scoring for any article whose text contains `title`.
    pub fn fail_for(mut self, title: &str) -> Self {
        self.fail_titles.insert(title.to_string());
        self
    }
}

#[async_trait]
impl ArticleScorer for MockScorer {
    async fn score(
        &self,
        article_text: &str,
        _entity: &str,
        _parent_context: Option<&str>,
    ) -> Result<ArticleAnalysis> {
        if self.fail_titles.iter().any(|t| article_text.contains(t.as_str())) {
            return Err(anyhow!("MockScorer: injected failure"));
        }
        let important = self
            .important_titles
            .iter()
            .any(|t| article_text.contains(t.as_str()));
        Ok(ArticleAnalysis {
            sentiment: if important {
                Sentiment::Negative
            } else {
                Sentiment::Neutral
            },
            summary: format!("mock summary: {}", &article_text[..article_text.len().min(32)]),
            important,
        })
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

/// Records every delivery and alert; selected recipients can be made to fail.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(String, RenderedReport)>>,
    alerts: Mutex<Vec<(String, String)>>,
    fail_recipients: HashSet<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(mut self, recipient: &str) -> Self {
        self.fail_recipients.insert(recipient.to_string());
        self
    }

    pub fn sent(&self) -> Vec<(String, RenderedReport)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn alerts(&self) -> Vec<(String, String)> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportSink for RecordingSink {
    async fn send(&self, recipient: &str, report: &RenderedReport) -> Result<String> {
        if self.fail_recipients.contains(recipient) {
            return Err(anyhow!("RecordingSink: injected failure for {recipient}"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), report.clone()));
        Ok(format!("msg-{}", self.sent.lock().unwrap().len()))
    }

    async fn send_alert(&self, recipient: &str, error: &str) -> Result<()> {
        self.alerts
            .lock()
            .unwrap()
            .push((recipient.to_string(), error.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Launchers
// ---------------------------------------------------------------------------

/// Records jobs without running anything; selected launch indices can fail.
#[derive(Default)]
pub struct RecordingLauncher {
    jobs: Mutex<Vec<WorkerJob>>,
    fail_indices: HashSet<usize>,
    calls: Mutex<usize>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `index`-th launch call (zero-based).
    pub fn fail_launch(mut self, index: usize) -> Self {
        self.fail_indices.insert(index);
        self
    }

    pub fn jobs(&self) -> Vec<WorkerJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkerLauncher for RecordingLauncher {
    async fn launch(&self, job: WorkerJob) -> Result<()> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let current = *calls;
            *calls += 1;
            current
        };
        if self.fail_indices.contains(&call) {
            return Err(anyhow!("RecordingLauncher: injected launch failure"));
        }
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

/// Runs the worker inline within `launch`. Deterministic alternative to
/// `SpawnLauncher` for pipeline tests: by the time dispatch returns, every
/// batch has been processed.
pub struct InlineLauncher {
    worker: Arc<Worker>,
}

impl InlineLauncher {
    pub fn new(worker: Arc<Worker>) -> Self {
        Self { worker }
    }
}

#[async_trait]
impl WorkerLauncher for InlineLauncher {
    async fn launch(&self, job: WorkerJob) -> Result<()> {
        self.worker.run(job).await;
        Ok(())
    }
}
