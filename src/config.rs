use std::env;
use std::str::FromStr;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub mail_api_url: String,
    /// Provider credential. Its absence is a per-invocation configuration
    /// error rather than a startup panic, so operator endpoints stay usable.
    pub mail_api_key: Option<String>,
    pub mail_from: String,
    /// Shared bearer credential for the trigger/operator endpoints.
    pub service_token: String,
    pub stale_after_secs: i64,
    pub unattempted_after_secs: i64,
    pub retry_base_secs: i64,
    pub default_max_retries: i32,
    pub reaper_delay_ms: u64,
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            port: parsed("PORT", 3000),
            mail_api_url: env::var("MAIL_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com/emails".to_string()),
            mail_api_key: env::var("MAIL_API_KEY").ok(),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@localhost".to_string()),
            service_token: env::var("SERVICE_TOKEN")
                .unwrap_or_else(|_| "dev-service-token".to_string()),
            stale_after_secs: parsed("STALE_AFTER_SECS", 600),
            unattempted_after_secs: parsed("UNATTEMPTED_AFTER_SECS", 30),
            retry_base_secs: parsed("RETRY_BASE_SECS", 120),
            default_max_retries: parsed("DEFAULT_MAX_RETRIES", 3),
            reaper_delay_ms: parsed("REAPER_DELAY_MS", 2000),
        }
    }
}
