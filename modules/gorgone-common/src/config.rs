use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Provider keys
    pub twitterapi_api_key: String,
    pub tikapi_api_key: String,
    pub newswire_api_key: String,

    // Embedding provider (OpenAI-compatible)
    pub embedding_api_key: String,
    /// Override for the embeddings base URL. Empty = provider default.
    pub embedding_base_url: Option<String>,
    pub embedding_model: String,

    // Job queue callbacks
    pub queue_token: String,
    pub queue_signing_key: String,

    // Inbound webhook shared secret (X-API-Key)
    pub webhook_secret: String,

    /// Public base URL of this service, used as the callback target for
    /// queue-delivered jobs.
    pub app_url: String,

    // Web server
    pub web_host: String,
    pub web_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            twitterapi_api_key: required_env("TWITTERAPI_API_KEY"),
            tikapi_api_key: required_env("TIKAPI_API_KEY"),
            newswire_api_key: required_env("NEWSWIRE_API_KEY"),
            embedding_api_key: required_env("EMBEDDING_API_KEY"),
            embedding_base_url: env::var("EMBEDDING_BASE_URL").ok().filter(|v| !v.is_empty()),
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            queue_token: required_env("QUEUE_TOKEN"),
            queue_signing_key: required_env("QUEUE_SIGNING_KEY"),
            webhook_secret: required_env("WEBHOOK_SECRET"),
            app_url: required_env("APP_URL"),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
        }
    }

    /// Log the presence and length of each sensitive env var for debugging.
    pub fn log_redacted(&self) {
        let vars = [
            ("DATABASE_URL", &self.database_url),
            ("TWITTERAPI_API_KEY", &self.twitterapi_api_key),
            ("TIKAPI_API_KEY", &self.tikapi_api_key),
            ("NEWSWIRE_API_KEY", &self.newswire_api_key),
            ("EMBEDDING_API_KEY", &self.embedding_api_key),
            ("QUEUE_TOKEN", &self.queue_token),
            ("QUEUE_SIGNING_KEY", &self.queue_signing_key),
            ("WEBHOOK_SECRET", &self.webhook_secret),
        ];
        for (name, value) in vars {
            if value.is_empty() {
                tracing::info!("{name} = (empty)");
            } else {
                tracing::info!("{name} = ({} chars)", value.len());
            }
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
