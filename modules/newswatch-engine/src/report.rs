use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use newswatch_common::{EntityRecord, NewswatchError, ScoredArticle};
use newswatch_store::{EntityStore, RecipientDirectory};

use crate::traits::ReportSink;

/// One entity's slice of the digest: only its important articles.
#[derive(Debug, Clone)]
pub struct EntitySection {
    pub entity_name: String,
    pub articles: Vec<ScoredArticle>,
}

/// Denominator statistics for the summary line. Entities without important
/// articles are omitted from the body but still counted here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportStats {
    pub total_entities: usize,
    pub entities_with_important: usize,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub tenant: String,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<EntitySection>,
    pub stats: ReportStats,
}

impl Report {
    /// True when no entity had any important article and the rendered body
    /// is the single "No Important Updates" placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.sections.is_empty()
    }
}

/// A report rendered for delivery.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub subject: String,
    pub html: String,
}

/// Build the digest structure from the final store contents.
pub fn build_report(tenant: &str, records: &[EntityRecord]) -> Report {
    let mut sections = Vec::new();
    let total_entities = records.len();

    for record in records {
        let important: Vec<ScoredArticle> = record
            .analysis
            .iter()
            .flat_map(|a| a.important_articles().cloned())
            .collect();
        if important.is_empty() {
            continue;
        }
        sections.push(EntitySection {
            entity_name: record.entity_name.clone(),
            articles: important,
        });
    }

    let stats = ReportStats {
        total_entities,
        entities_with_important: sections.len(),
    };
    Report {
        tenant: tenant.to_string(),
        generated_at: Utc::now(),
        sections,
        stats,
    }
}

/// Render the digest as a self-contained HTML email body.
pub fn render_report(report: &Report) -> RenderedReport {
    let subject = format!("News digest: {}", report.tenant);

    let mut body = String::new();
    body.push_str("<html><body style=\"font-family: Helvetica, Arial, sans-serif;\">\n");
    body.push_str(&format!(
        "<h1>News digest for {}</h1>\n<p>{} of {} tracked entities had important updates. Generated {}.</p>\n",
        escape_html(&report.tenant),
        report.stats.entities_with_important,
        report.stats.total_entities,
        report.generated_at.format("%Y-%m-%d %H:%M UTC"),
    ));

    if report.is_placeholder() {
        body.push_str(
            "<h2>No Important Updates</h2>\n\
             <p>No significant news or updates were found for any tracked entities.</p>\n",
        );
    } else {
        for section in &report.sections {
            body.push_str(&format!("<h2>{}</h2>\n", escape_html(&section.entity_name)));
            for scored in &section.articles {
                body.push_str(&format!(
                    "<h3><a href=\"{}\">{}</a></h3>\n\
                     <p><strong>Summary:</strong> {}</p>\n\
                     <p><strong>Sentiment:</strong> {}</p>\n",
                    escape_html(&scored.article.url),
                    escape_html(&scored.article.title),
                    escape_html(&scored.analysis.summary),
                    scored.analysis.sentiment,
                ));
            }
        }
    }
    body.push_str("</body></html>\n");

    RenderedReport {
        subject,
        html: body,
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Per-recipient outcome of a delivery round.
#[derive(Debug, Default)]
pub struct DeliveryOutcome {
    pub delivered: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Reads the final store contents, assembles the digest, and fans it out to
/// the tenant's recipients.
pub struct ReportAssembler {
    store: Arc<dyn EntityStore>,
    directory: Arc<dyn RecipientDirectory>,
    sink: Arc<dyn ReportSink>,
    default_recipient: String,
}

impl ReportAssembler {
    pub fn new(
        store: Arc<dyn EntityStore>,
        directory: Arc<dyn RecipientDirectory>,
        sink: Arc<dyn ReportSink>,
        default_recipient: String,
    ) -> Self {
        Self {
            store,
            directory,
            sink,
            default_recipient,
        }
    }

    /// Assemble and deliver the tenant's digest. One recipient failing never
    /// blocks the others; every recipient failing is its own error, distinct
    /// from having no recipients configured at all.
    pub async fn deliver(&self, tenant: &str) -> Result<DeliveryOutcome, NewswatchError> {
        let records = self.store.list_entities(tenant, true).await?;
        let report = build_report(tenant, &records);
        let rendered = render_report(&report);

        let recipients = self
            .directory
            .get(tenant, &self.default_recipient)
            .await?
            .into_iter()
            .filter(|r| !r.is_empty())
            .collect::<Vec<_>>();
        if recipients.is_empty() {
            return Err(NewswatchError::NoRecipients(tenant.to_string()));
        }

        let mut outcome = DeliveryOutcome::default();
        for recipient in &recipients {
            match self.sink.send(recipient, &rendered).await {
                Ok(message_id) => {
                    info!(recipient, message_id, "Digest delivered");
                    outcome.delivered.push(recipient.clone());
                }
                Err(e) => {
                    warn!(recipient, error = %e, "Digest delivery failed");
                    outcome.failed.push((recipient.clone(), e.to_string()));
                }
            }
        }

        if outcome.delivered.is_empty() {
            return Err(NewswatchError::AllRecipientsFailed(outcome.failed.len()));
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use newswatch_common::{
        Article, ArticleAnalysis, EntityAnalysis, Sentiment,
    };
    use newswatch_store::{MemoryEntityStore, MemoryRecipientDirectory};

    use crate::testing::RecordingSink;

    fn record(name: &str, importance: &[bool]) -> EntityRecord {
        let articles = importance
            .iter()
            .enumerate()
            .map(|(i, &important)| ScoredArticle {
                article: Article {
                    title: format!("{name} article {i}"),
                    url: format!("https://example.com/{name}/{i}"),
                    snippet: String::new(),
                },
                analysis: ArticleAnalysis {
                    sentiment: Sentiment::Neutral,
                    summary: format!("summary {i}"),
                    important,
                },
            })
            .collect();
        EntityRecord {
            entity_name: name.to_string(),
            completed: true,
            analysis: Some(EntityAnalysis::new(articles)),
        }
    }

    #[test]
    fn entities_without_important_articles_are_omitted_but_counted() {
        let records = vec![
            record("loud", &[true, false]),
            record("quiet", &[false, false]),
        ];
        let report = build_report("acme", &records);

        assert_eq!(report.sections.len(), 1);
        assert_eq!(report.sections[0].entity_name, "loud");
        assert_eq!(report.sections[0].articles.len(), 1);
        assert_eq!(
            report.stats,
            ReportStats {
                total_entities: 2,
                entities_with_important: 1
            }
        );
    }

    #[test]
    fn all_quiet_produces_placeholder() {
        let records = vec![record("a", &[false]), record("b", &[])];
        let report = build_report("acme", &records);
        assert!(report.is_placeholder());

        let rendered = render_report(&report);
        assert!(rendered.html.contains("No Important Updates"));
        assert!(rendered.html.contains("0 of 2 tracked entities"));
    }

    #[test]
    fn rendered_body_links_important_articles() {
        let report = build_report("acme", &[record("loud", &[true])]);
        let rendered = render_report(&report);
        assert!(rendered.html.contains("<h2>loud</h2>"));
        assert!(rendered
            .html
            .contains("<a href=\"https://example.com/loud/0\">loud article 0</a>"));
        assert!(!rendered.html.contains("No Important Updates"));
    }

    #[test]
    fn html_is_escaped() {
        let report = build_report("<acme & co>", &[]);
        let rendered = render_report(&report);
        assert!(rendered.html.contains("&lt;acme &amp; co&gt;"));
    }

    async fn assembler_with(
        sink: Arc<RecordingSink>,
        recipients: &[&str],
    ) -> ReportAssembler {
        let store = Arc::new(MemoryEntityStore::new());
        store.create_table("acme").await.unwrap();
        store
            .add_entities("acme", &["Widget Co".to_string()])
            .await
            .unwrap();

        let directory = Arc::new(MemoryRecipientDirectory::new());
        let emails: Vec<String> = recipients.iter().map(|s| s.to_string()).collect();
        directory.setup("acme", &emails).await.unwrap();

        ReportAssembler::new(store, directory, sink, "ops@example.com".to_string())
    }

    #[tokio::test]
    async fn one_recipient_failing_does_not_block_the_rest() {
        let sink = Arc::new(RecordingSink::new().fail_for("bad@example.com"));
        let assembler =
            assembler_with(Arc::clone(&sink), &["good@example.com", "bad@example.com"]).await;

        let outcome = assembler.deliver("acme").await.unwrap();
        assert_eq!(outcome.delivered, vec!["good@example.com"]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn all_recipients_failing_is_a_distinct_error() {
        let sink = Arc::new(
            RecordingSink::new()
                .fail_for("a@example.com")
                .fail_for("b@example.com"),
        );
        let assembler = assembler_with(sink, &["a@example.com", "b@example.com"]).await;

        let err = assembler.deliver("acme").await.unwrap_err();
        assert!(matches!(err, NewswatchError::AllRecipientsFailed(2)));
    }

    #[tokio::test]
    async fn missing_recipient_list_falls_back_to_default() {
        let sink = Arc::new(RecordingSink::new());
        let store = Arc::new(MemoryEntityStore::new());
        store.create_table("acme").await.unwrap();
        let directory = Arc::new(MemoryRecipientDirectory::new());
        let assembler = ReportAssembler::new(
            store,
            directory,
            Arc::clone(&sink) as Arc<dyn ReportSink>,
            "ops@example.com".to_string(),
        );

        let outcome = assembler.deliver("acme").await.unwrap();
        assert_eq!(outcome.delivered, vec!["ops@example.com"]);
    }
}
