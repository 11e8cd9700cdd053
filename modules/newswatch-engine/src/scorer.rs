use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use newswatch_common::{ArticleAnalysis, Sentiment};

use crate::traits::ArticleScorer;

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// LLM-backed scorer using OpenAI chat completions. Constructed once and
/// injected wherever scoring happens; failures are per-article and the
/// worker substitutes a placeholder.
pub struct OpenAiScorer {
    api_key: String,
    model: String,
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// The JSON object the model is asked to return.
#[derive(Deserialize)]
struct Verdict {
    #[serde(default)]
    is_relevant: bool,
    #[serde(default)]
    sentiment: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    important: bool,
}

impl OpenAiScorer {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            http: reqwest::Client::new(),
            base_url: OPENAI_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    fn prompt(entity: &str, parent: &str) -> String {
        format!(
            "First determine if this article is actually about {entity}. \
             Then analyze and return a JSON object with:\n\
             1. is_relevant: boolean, true if the article is specifically about {entity} \
             (not just mentions the words)\n\
             2. sentiment: overall sentiment (positive/negative/neutral)\n\
             3. summary: 2-3 sentence summary\n\
             4. important: boolean, true ONLY if (article is relevant AND \
             (mentions lawsuits OR mentions {parent}))"
        )
    }
}

#[async_trait]
impl ArticleScorer for OpenAiScorer {
    async fn score(
        &self,
        article_text: &str,
        entity: &str,
        parent_context: Option<&str>,
    ) -> Result<ArticleAnalysis> {
        let parent = parent_context.unwrap_or(entity);
        let prompt = Self::prompt(entity, parent);

        debug!(entity, model = %self.model, "Scoring article");
        let url = format!("{}/chat/completions", self.base_url);
        let request = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a helpful assistant that analyzes articles and returns JSON."
                },
                {
                    "role": "user",
                    "content": format!("Article text: {article_text}\n\nPrompt: {prompt}")
                }
            ],
        });

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("scorer API error ({status}): {body}"));
        }

        let chat: ChatResponse = resp.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("no content in scorer response"))?;

        parse_verdict(&content)
    }
}

/// Parse the model's reply, tolerating markdown code fences around the JSON.
fn parse_verdict(content: &str) -> Result<ArticleAnalysis> {
    let cleaned = content
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string();
    let verdict: Verdict = serde_json::from_str(&cleaned)
        .map_err(|e| anyhow!("malformed verdict JSON: {e}"))?;

    let sentiment = match verdict.sentiment.to_ascii_lowercase().as_str() {
        "positive" => Sentiment::Positive,
        "negative" => Sentiment::Negative,
        _ => Sentiment::Neutral,
    };
    Ok(ArticleAnalysis {
        sentiment,
        summary: verdict.summary,
        important: verdict.important && verdict.is_relevant,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_verdict() {
        let content = r#"```json
        {"is_relevant": true, "sentiment": "Negative", "summary": "Sued.", "important": true}
        ```"#;
        let analysis = parse_verdict(content).unwrap();
        assert_eq!(analysis.sentiment, Sentiment::Negative);
        assert_eq!(analysis.summary, "Sued.");
        assert!(analysis.important);
    }

    #[test]
    fn importance_requires_relevance() {
        let content =
            r#"{"is_relevant": false, "sentiment": "neutral", "summary": "", "important": true}"#;
        let analysis = parse_verdict(content).unwrap();
        assert!(!analysis.important);
    }

    #[test]
    fn unknown_sentiment_defaults_to_neutral() {
        let content =
            r#"{"is_relevant": true, "sentiment": "mixed", "summary": "", "important": false}"#;
        assert_eq!(parse_verdict(content).unwrap().sentiment, Sentiment::Neutral);
    }

    #[test]
    fn malformed_json_is_an_error_for_the_worker_to_absorb() {
        assert!(parse_verdict("the model rambled instead of returning JSON").is_err());
    }
}
