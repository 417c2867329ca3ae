use thiserror::Error;

pub type Result<T> = std::result::Result<T, NewswireError>;

#[derive(Debug, Error)]
pub enum NewswireError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited")]
    RateLimited,

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for NewswireError {
    fn from(err: reqwest::Error) -> Self {
        NewswireError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for NewswireError {
    fn from(err: serde_json::Error) -> Self {
        NewswireError::Parse(err.to_string())
    }
}
