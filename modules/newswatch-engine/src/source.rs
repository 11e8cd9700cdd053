use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use newswatch_common::Article;

use crate::traits::ArticleSource;

const SEARCH_API_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// Google Custom Search source, restricted to recent, date-sorted results.
pub struct GoogleNewsSource {
    api_key: String,
    cse_id: String,
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl GoogleNewsSource {
    pub fn new(api_key: &str, cse_id: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            cse_id: cse_id.to_string(),
            http: reqwest::Client::new(),
            base_url: SEARCH_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }
}

#[async_trait]
impl ArticleSource for GoogleNewsSource {
    async fn search(
        &self,
        entity: &str,
        window_hours: u32,
        max_results: usize,
    ) -> Result<Vec<Article>> {
        // The API accepts whole days only; round the window up.
        let days = window_hours.div_ceil(24).max(1);

        debug!(entity, days, "Searching for articles");
        let resp = self
            .http
            .get(&self.base_url)
            .query(&[
                ("key", self.api_key.clone()),
                ("cx", self.cse_id.clone()),
                ("q", entity.to_string()),
                ("num", max_results.min(10).to_string()),
                ("dateRestrict", format!("d{days}")),
                ("sort", "date".to_string()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("search API returned {status}: {body}");
        }

        let data: SearchResponse = resp.json().await?;
        Ok(data
            .items
            .into_iter()
            .take(max_results)
            .map(|item| Article {
                title: item.title,
                url: item.link,
                snippet: item.snippet,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_parsing_tolerates_missing_fields() {
        let data: SearchResponse = serde_json::from_str(
            r#"{"items": [{"title": "t", "link": "u"}, {"snippet": "only snippet"}]}"#,
        )
        .unwrap();
        assert_eq!(data.items.len(), 2);
        assert_eq!(data.items[0].title, "t");
        assert_eq!(data.items[1].snippet, "only snippet");
        assert!(data.items[1].link.is_empty());
    }

    #[test]
    fn empty_response_has_no_items() {
        let data: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(data.items.is_empty());
    }
}
