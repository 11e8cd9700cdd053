use anyhow::Result;
use async_trait::async_trait;

use crate::report::RenderedReport;
use crate::traits::ReportSink;

/// No-op sink for dry runs and environments without outbound mail.
pub struct NoopSink;

#[async_trait]
impl ReportSink for NoopSink {
    async fn send(&self, _recipient: &str, _report: &RenderedReport) -> Result<String> {
        Ok(String::new())
    }

    async fn send_alert(&self, _recipient: &str, _error: &str) -> Result<()> {
        Ok(())
    }
}
