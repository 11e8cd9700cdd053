use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall sentiment of an article toward a tracked entity.
///
/// `Failed` is the degraded placeholder a worker substitutes when the scorer
/// errors on an article; it keeps article counts consistent for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    #[serde(rename = "Analysis failed")]
    Failed,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "positive"),
            Sentiment::Negative => write!(f, "negative"),
            Sentiment::Neutral => write!(f, "neutral"),
            Sentiment::Failed => write!(f, "Analysis failed"),
        }
    }
}

/// A candidate article as returned by the search source, before scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Scorer verdict for one article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleAnalysis {
    pub sentiment: Sentiment,
    pub summary: String,
    /// Relevant to the entity AND meets the escalation criterion
    /// (litigation or parent-entity mention).
    pub important: bool,
}

impl ArticleAnalysis {
    /// Placeholder analysis recorded when the scorer fails for an article.
    pub fn failed() -> Self {
        Self {
            sentiment: Sentiment::Failed,
            summary: "Analysis failed".to_string(),
            important: false,
        }
    }
}

/// One article together with its scorer verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredArticle {
    #[serde(flatten)]
    pub article: Article,
    pub analysis: ArticleAnalysis,
}

/// The full per-entity result of one processing cycle. Stored opaque to the
/// store as JSONB; important articles sort first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityAnalysis {
    pub generated_at: DateTime<Utc>,
    pub articles: Vec<ScoredArticle>,
}

impl EntityAnalysis {
    pub fn new(articles: Vec<ScoredArticle>) -> Self {
        Self {
            generated_at: Utc::now(),
            articles,
        }
    }

    pub fn important_articles(&self) -> impl Iterator<Item = &ScoredArticle> {
        self.articles.iter().filter(|a| a.analysis.important)
    }
}

/// One tracked-entity row as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_name: String,
    pub completed: bool,
    /// Present only when the listing was asked to include analyses and a
    /// worker has written one this cycle.
    pub analysis: Option<EntityAnalysis>,
}

/// Completion state of a tenant's fleet.
///
/// Zero tracked entities is its own outcome rather than "complete" or
/// "pending": there is nothing to report, and treating it as done would be
/// misleading to the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// Tenant has no tracked entities at all.
    Empty,
    /// Every tracked entity has completed this cycle.
    Complete { total: usize },
    /// At least one entity is still pending.
    Pending { completed: usize, total: usize },
}

impl CompletionStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, CompletionStatus::Complete { .. })
    }
}

/// A unit of work handed to one worker: a bounded batch of entity names
/// belonging to a single tenant and cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerJob {
    pub tenant: String,
    /// Cycle token stamped by `clear_all`; stale workers from an abandoned
    /// cycle are rejected at the persist step.
    pub cycle: Uuid,
    pub entities: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_failed_serializes_as_analysis_failed() {
        let json = serde_json::to_string(&Sentiment::Failed).unwrap();
        assert_eq!(json, "\"Analysis failed\"");
        let back: Sentiment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Sentiment::Failed);
    }

    #[test]
    fn sentiment_round_trips_lowercase() {
        for (s, want) in [
            (Sentiment::Positive, "\"positive\""),
            (Sentiment::Negative, "\"negative\""),
            (Sentiment::Neutral, "\"neutral\""),
        ] {
            assert_eq!(serde_json::to_string(&s).unwrap(), want);
        }
    }

    #[test]
    fn scored_article_flattens_article_fields() {
        let scored = ScoredArticle {
            article: Article {
                title: "t".into(),
                url: "u".into(),
                snippet: "s".into(),
            },
            analysis: ArticleAnalysis {
                sentiment: Sentiment::Neutral,
                summary: "fine".into(),
                important: false,
            },
        };
        let v = serde_json::to_value(&scored).unwrap();
        assert_eq!(v["title"], "t");
        assert_eq!(v["analysis"]["sentiment"], "neutral");
    }

    #[test]
    fn entity_analysis_filters_important() {
        let mk = |important| ScoredArticle {
            article: Article {
                title: "t".into(),
                url: "u".into(),
                snippet: "s".into(),
            },
            analysis: ArticleAnalysis {
                sentiment: Sentiment::Positive,
                summary: String::new(),
                important,
            },
        };
        let analysis = EntityAnalysis::new(vec![mk(true), mk(false), mk(true)]);
        assert_eq!(analysis.important_articles().count(), 2);
    }
}
