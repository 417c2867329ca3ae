pub mod error;
pub mod types;

pub use error::{Result, TwitterApiError};
pub use types::{
    ApiResponse, RuleData, RuleInput, SearchInput, SearchResponse, TweetPayload, TweetUser,
};

const BASE_URL: &str = "https://api.twitterapi.io/v2";

/// Maximum items per search page enforced by the provider.
pub const MAX_PAGE_SIZE: u32 = 100;

pub struct TwitterApiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TwitterApiClient {
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

    /// Create a webhook rule on the provider. Returns the remote rule id.
    pub async fn create_rule(&self, input: &RuleInput) -> Result<RuleData> {
        let url = format!("{}/rules", self.base_url);
        tracing::info!(tag = %input.tag, "Creating provider rule");
        let resp = self
            .client
            .post(&url)
            .header("X-API-Key", &self.api_key)
            .json(input)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let api_resp: ApiResponse<RuleData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// Update an existing rule's query, interval, or effect flag.
    pub async fn update_rule(&self, rule_id: &str, input: &RuleInput) -> Result<RuleData> {
        let url = format!("{}/rules/{}", self.base_url, rule_id);
        tracing::info!(rule_id, "Updating provider rule");
        let resp = self
            .client
            .patch(&url)
            .header("X-API-Key", &self.api_key)
            .json(input)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let api_resp: ApiResponse<RuleData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// Delete a rule on the provider.
    pub async fn delete_rule(&self, rule_id: &str) -> Result<()> {
        let url = format!("{}/rules/{}", self.base_url, rule_id);
        tracing::info!(rule_id, "Deleting provider rule");
        let resp = self
            .client
            .delete(&url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    /// Cursor-based tweet search used for backfill. `page_size` is clamped
    /// to the provider's 100-item ceiling.
    pub async fn search(
        &self,
        query: &str,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<SearchResponse> {
        let input = SearchInput {
            query: query.to_string(),
            query_type: "Latest".to_string(),
            cursor: cursor.map(str::to_string),
            max_items: page_size.min(MAX_PAGE_SIZE),
        };

        let url = format!("{}/search", self.base_url);
        tracing::debug!(query, cursor = ?input.cursor, "Tweet search");
        let resp = self
            .client
            .post(&url)
            .header("X-API-Key", &self.api_key)
            .json(&input)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    /// Fetch a single tweet's live state. Returns `None` when the tweet is
    /// gone (deleted or withheld).
    pub async fn get_tweet(&self, tweet_id: &str) -> Result<Option<TweetPayload>> {
        let url = format!("{}/tweets/{}", self.base_url, tweet_id);
        let resp = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await?;

        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        let resp = check_status(resp).await?;
        let api_resp: ApiResponse<TweetPayload> = resp.json().await?;
        Ok(Some(api_resp.data))
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.as_u16() == 429 {
        return Err(TwitterApiError::RateLimited);
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(TwitterApiError::Api {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tweet_content_prefers_full_text() {
        let tweet = TweetPayload {
            text: Some("short".to_string()),
            full_text: Some("the full text".to_string()),
            ..Default::default()
        };
        assert_eq!(tweet.content(), Some("the full text"));

        let tweet = TweetPayload {
            text: Some("short".to_string()),
            ..Default::default()
        };
        assert_eq!(tweet.content(), Some("short"));
    }

    #[test]
    fn user_handle_falls_back_across_generations() {
        let user = TweetUser {
            user_name: Some("Ada".to_string()),
            ..Default::default()
        };
        assert_eq!(user.handle(), Some("Ada"));

        let user = TweetUser {
            handle: Some("ada_l".to_string()),
            ..Default::default()
        };
        assert_eq!(user.handle(), Some("ada_l"));
    }

    #[test]
    fn search_input_serializes_provider_field_names() {
        let input = SearchInput {
            query: "#ai".to_string(),
            query_type: "Latest".to_string(),
            cursor: None,
            max_items: 50,
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["queryType"], "Latest");
        assert_eq!(json["maxItems"], 50);
        assert!(json.get("cursor").is_none());
    }
}
