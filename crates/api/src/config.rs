use std::time::Duration;

use atelier_replicate::client::DEFAULT_API_URL;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Provider and delivery settings for the generation pipeline.
    pub generation: GenerationConfig,
}

/// How attempt outcomes reach the job record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// An in-process loop runs attempts one at a time and polls the
    /// provider until each reaches a terminal state.
    Poll,
    /// All attempts are submitted up front; the provider reports outcomes
    /// via inbound webhook callbacks.
    Webhook,
}

/// Generation pipeline configuration.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Replicate API base URL.
    pub replicate_api_url: String,
    /// Replicate API token. Empty means unconfigured; job starts will fail
    /// at the provider, which the attempt bookkeeping absorbs as failures.
    pub replicate_api_token: String,
    /// Delivery mode for attempt outcomes.
    pub delivery: DeliveryMode,
    /// Public base URL for provider callbacks (required in webhook mode),
    /// e.g. `https://host/api/v1/webhooks/replicate`.
    pub webhook_base_url: Option<String>,
    /// Pause between attempts on the polling path.
    pub attempt_delay: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `REPLICATE_API_URL`    | `https://api.replicate.com`|
    /// | `REPLICATE_API_TOKEN`  | (empty)                    |
    /// | `GENERATION_DELIVERY`  | `poll`                     |
    /// | `WEBHOOK_BASE_URL`     | (unset)                    |
    /// | `ATTEMPT_DELAY_SECS`   | `2`                        |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let replicate_api_url =
            std::env::var("REPLICATE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());

        let replicate_api_token = std::env::var("REPLICATE_API_TOKEN").unwrap_or_default();

        let delivery = match std::env::var("GENERATION_DELIVERY")
            .unwrap_or_else(|_| "poll".into())
            .as_str()
        {
            "poll" => DeliveryMode::Poll,
            "webhook" => DeliveryMode::Webhook,
            other => panic!("GENERATION_DELIVERY must be 'poll' or 'webhook', got '{other}'"),
        };

        let webhook_base_url = std::env::var("WEBHOOK_BASE_URL").ok();
        if delivery == DeliveryMode::Webhook && webhook_base_url.is_none() {
            panic!("WEBHOOK_BASE_URL must be set when GENERATION_DELIVERY is 'webhook'");
        }

        let attempt_delay_secs: u64 = std::env::var("ATTEMPT_DELAY_SECS")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("ATTEMPT_DELAY_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            generation: GenerationConfig {
                replicate_api_url,
                replicate_api_token,
                delivery,
                webhook_base_url,
                attempt_delay: Duration::from_secs(attempt_delay_secs),
            },
        }
    }
}
