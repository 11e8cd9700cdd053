use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Scorer (OpenAI)
    pub openai_api_key: String,
    pub openai_model: String,

    // Search source (Google Custom Search)
    pub google_api_key: String,
    pub google_cse_id: String,

    // Outbound mail
    pub mail_api_url: String,
    pub mail_api_key: String,
    pub mail_from: String,
    /// Fallback recipient when a tenant has no recipient list, and the
    /// target of operator failure alerts.
    pub operator_email: String,

    // Dispatch tuning
    pub batch_size: usize,
    pub poll_interval_secs: u64,
    pub poll_max_attempts: u32,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            openai_api_key: required_env("OPENAI_API_KEY"),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            google_api_key: required_env("GOOGLE_API_KEY"),
            google_cse_id: required_env("GOOGLE_CSE_ID"),
            mail_api_url: required_env("MAIL_API_URL"),
            mail_api_key: required_env("MAIL_API_KEY"),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "reports@newswatch.local".to_string()),
            operator_email: required_env("OPERATOR_EMAIL"),
            batch_size: parse_env("BATCH_SIZE", 10),
            poll_interval_secs: parse_env("POLL_INTERVAL_SECS", 10),
            poll_max_attempts: parse_env("POLL_MAX_ATTEMPTS", 30),
        }
    }

    /// Log the loaded configuration with secrets redacted.
    pub fn log_redacted(&self) {
        tracing::info!(
            database = %redact_url(&self.database_url),
            model = %self.openai_model,
            batch_size = self.batch_size,
            poll_interval_secs = self.poll_interval_secs,
            poll_max_attempts = self.poll_max_attempts,
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number")),
        Err(_) => default,
    }
}

/// Strip userinfo from a connection URL for logging.
fn redact_url(url: &str) -> String {
    match url.find('@') {
        Some(at) => {
            let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
            format!("{}***@{}", &url[..scheme_end], &url[at + 1..])
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_credentials_in_url() {
        assert_eq!(
            redact_url("postgres://user:pw@db:5432/news"),
            "postgres://***@db:5432/news"
        );
        assert_eq!(redact_url("postgres://db/news"), "postgres://db/news");
    }
}
