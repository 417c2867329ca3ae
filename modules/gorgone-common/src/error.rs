use thiserror::Error;

#[derive(Error, Debug)]
pub enum GorgoneError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Provider error (status {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Provider rate limit exceeded")]
    RateLimited,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Signature verification failed")]
    SignatureInvalid,

    #[error("Scheduling error: {0}")]
    Scheduling(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
