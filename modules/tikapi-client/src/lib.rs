pub mod error;
pub mod types;

pub use error::{Result, TikApiError};
pub use types::{
    UserProfile, VideoAuthor, VideoHashtag, VideoPayload, VideoSearchResponse, VideoStats,
};

const BASE_URL: &str = "https://api.tikapi.io/public";

/// Maximum items per search page enforced by the provider.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Poll intervals the provider accepts, in minutes.
pub const ALLOWED_INTERVAL_MINUTES: [i64; 3] = [60, 180, 360];

pub struct TikApiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TikApiClient {
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

    /// Fetch a user profile by handle.
    pub async fn user(&self, handle: &str) -> Result<UserProfile> {
        let url = format!("{}/user/{}", self.base_url, handle);
        let resp = self.get(&url, &[]).await?;
        Ok(resp.json().await?)
    }

    /// Fetch a single video's live state. Returns `None` when the video is
    /// gone (removed or made private).
    pub async fn video(&self, video_id: &str) -> Result<Option<VideoPayload>> {
        let url = format!("{}/video/{}", self.base_url, video_id);
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
        Ok(Some(resp.json().await?))
    }

    /// Keyword search across videos.
    pub async fn search_keyword(
        &self,
        query: &str,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<VideoSearchResponse> {
        let url = format!("{}/search/video", self.base_url);
        self.search(&url, query, cursor, page_size).await
    }

    /// Videos tagged with a hashtag (no leading `#`).
    pub async fn search_hashtag(
        &self,
        hashtag: &str,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<VideoSearchResponse> {
        let url = format!("{}/hashtag/video", self.base_url);
        self.search(&url, hashtag, cursor, page_size).await
    }

    /// Recent videos posted by a user.
    pub async fn user_videos(
        &self,
        handle: &str,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<VideoSearchResponse> {
        let url = format!("{}/user/{}/videos", self.base_url, handle);
        self.search(&url, "", cursor, page_size).await
    }

    async fn search(
        &self,
        url: &str,
        query: &str,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<VideoSearchResponse> {
        let count = page_size.min(MAX_PAGE_SIZE).to_string();
        let mut params: Vec<(&str, &str)> = vec![("count", &count)];
        if !query.is_empty() {
            params.push(("query", query));
        }
        if let Some(c) = cursor {
            params.push(("cursor", c));
        }

        tracing::debug!(url, query, cursor = ?cursor, "Video search");
        let resp = self.get(url, &params).await?;
        Ok(resp.json().await?)
    }

    async fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<reqwest::Response> {
        let resp = self
            .client
            .get(url)
            .header("X-API-Key", &self.api_key)
            .query(params)
            .send()
            .await?;
        check_status(resp).await
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.as_u16() == 429 {
        return Err(TikApiError::RateLimited);
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(TikApiError::Api {
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
    fn video_payload_parses_provider_field_names() {
        let raw = serde_json::json!({
            "id": "V42",
            "desc": "dance #fyp",
            "createTime": 1_760_000_000,
            "author": {"uniqueId": "dancer", "followerCount": 12000},
            "stats": {"playCount": 5000, "diggCount": 300, "commentCount": 12},
            "challenges": [{"name": "fyp"}]
        });
        let video: VideoPayload = serde_json::from_value(raw).unwrap();
        assert_eq!(video.id.as_deref(), Some("V42"));
        assert_eq!(video.stats.as_ref().unwrap().play_count, Some(5000));
        assert_eq!(video.author.as_ref().unwrap().unique_id.as_deref(), Some("dancer"));
        assert_eq!(video.hashtags[0].name.as_deref(), Some("fyp"));
    }

    #[test]
    fn allowed_intervals_are_the_provider_contract() {
        assert_eq!(ALLOWED_INTERVAL_MINUTES, [60, 180, 360]);
    }
}
