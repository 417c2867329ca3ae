pub mod error;
pub mod types;

pub use error::{NewswireError, Result};
pub use types::{ArticlePayload, ArticleQuery, ArticleSearchResponse};

const BASE_URL: &str = "https://api.newswire.dev/v1";

/// Per-fetch article ceiling enforced by the provider.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Minimum poll interval accepted by the provider, in seconds.
pub const MIN_INTERVAL_SECONDS: i64 = 15 * 60;

pub struct NewswireClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl NewswireClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    /// Query-object article search. One page per call; the provider caps
    /// pages at 100 articles.
    pub async fn search(&self, query: &ArticleQuery) -> Result<ArticleSearchResponse> {
        let url = format!("{}/articles/search", self.base_url);
        tracing::debug!(query = %query.q, page = query.page, "Article search");
        let resp = self
            .client
            .post(&url)
            .header("X-API-Key", &self.api_key)
            .json(query)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(NewswireError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NewswireError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(resp.json().await?)
    }
}
