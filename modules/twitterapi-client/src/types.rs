use serde::{Deserialize, Serialize};

// --- Rule management ---

/// Input for creating or updating a webhook rule on the provider.
#[derive(Debug, Clone, Serialize)]
pub struct RuleInput {
    pub tag: String,
    pub value: String,
    #[serde(rename = "interval_seconds")]
    pub interval_seconds: i64,
    #[serde(rename = "is_effect", skip_serializing_if = "Option::is_none")]
    pub is_effect: Option<bool>,
}

/// Rule metadata returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleData {
    pub rule_id: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// Wrapper for provider API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

// --- Search ---

/// Input for the cursor-based search endpoint. Page size is capped at 100
/// by the provider.
#[derive(Debug, Clone, Serialize)]
pub struct SearchInput {
    pub query: String,
    #[serde(rename = "queryType")]
    pub query_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(rename = "maxItems")]
    pub max_items: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub tweets: Vec<TweetPayload>,
    #[serde(rename = "next_cursor", default)]
    pub next_cursor: Option<String>,
    #[serde(rename = "has_next_page", default)]
    pub has_next_page: bool,
}

// --- Tweets ---

/// Author info nested inside a tweet payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TweetUser {
    pub id: Option<String>,
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    /// Some payload generations use `handle` instead of `userName`.
    #[serde(default)]
    pub handle: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "isVerified", default)]
    pub is_verified: bool,
    #[serde(default)]
    pub followers: Option<i64>,
    #[serde(default)]
    pub following: Option<i64>,
    #[serde(rename = "favouritesCount", default)]
    pub favourites_count: Option<i64>,
    #[serde(rename = "statusesCount", default)]
    pub statuses_count: Option<i64>,
    #[serde(default)]
    pub location: Option<String>,
}

impl TweetUser {
    /// Returns whichever handle field is populated.
    pub fn handle(&self) -> Option<&str> {
        self.user_name.as_deref().or(self.handle.as_deref())
    }
}

/// A single tweet as delivered by webhook push or search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TweetPayload {
    pub id: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "full_text", default)]
    pub full_text: Option<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(rename = "inReplyToId", default)]
    pub in_reply_to_id: Option<String>,
    #[serde(rename = "user", alias = "author", default)]
    pub user: Option<TweetUser>,
    #[serde(rename = "likeCount", default)]
    pub like_count: Option<i64>,
    #[serde(rename = "retweetCount", default)]
    pub retweet_count: Option<i64>,
    #[serde(rename = "replyCount", default)]
    pub reply_count: Option<i64>,
    #[serde(rename = "quoteCount", default)]
    pub quote_count: Option<i64>,
    #[serde(rename = "bookmarkCount", default)]
    pub bookmark_count: Option<i64>,
    #[serde(rename = "viewCount", default)]
    pub view_count: Option<i64>,
}

impl TweetPayload {
    /// Returns whichever text field is populated, preferring `full_text`.
    pub fn content(&self) -> Option<&str> {
        self.full_text.as_deref().or(self.text.as_deref())
    }
}
