use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::warn;

use crate::report::RenderedReport;
use crate::traits::ReportSink;

/// Guardrail on outgoing body size; most mail APIs reject large payloads.
const MAX_BODY_KB: usize = 9500;

/// HTTP mail-API sink. Posts JSON messages to a transactional mail endpoint
/// with bearer auth.
pub struct HttpMailer {
    api_url: String,
    api_key: String,
    from: String,
    http: reqwest::Client,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self {
            api_url,
            api_key,
            from,
            http: reqwest::Client::new(),
        }
    }

    async fn post_message(&self, payload: serde_json::Value) -> Result<String> {
        let url = format!("{}/messages", self.api_url.trim_end_matches('/'));
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Mail API returned non-success");
            anyhow::bail!("mail API returned {status}");
        }

        let body: serde_json::Value = resp.json().await?;
        Ok(body
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }
}

#[async_trait]
impl ReportSink for HttpMailer {
    async fn send(&self, recipient: &str, report: &RenderedReport) -> Result<String> {
        let size_kb = report.html.len() / 1024;
        if size_kb > MAX_BODY_KB {
            anyhow::bail!("report body too large: {size_kb}KB");
        }

        let payload = json!({
            "from": self.from,
            "to": recipient,
            "subject": report.subject,
            "html": report.html,
        });
        self.post_message(payload).await
    }

    async fn send_alert(&self, recipient: &str, error: &str) -> Result<()> {
        let html = format!(
            "<html><body style=\"font-family: Helvetica, Arial, sans-serif;\">\n\
             <h2>News alert cycle failed</h2>\n\
             <p><strong>Time:</strong> {}</p>\n\
             <p><strong>Error details:</strong></p>\n\
             <pre>{}</pre>\n\
             </body></html>\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            error,
        );
        let payload = json!({
            "from": self.from,
            "to": recipient,
            "subject": "Newswatch cycle failed",
            "html": html,
        });
        self.post_message(payload).await?;
        Ok(())
    }
}
