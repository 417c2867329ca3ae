use serde::{Deserialize, Serialize};

/// Author metadata nested inside a video payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoAuthor {
    pub id: Option<String>,
    #[serde(rename = "uniqueId")]
    pub unique_id: Option<String>,
    pub nickname: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(rename = "followerCount", default)]
    pub follower_count: Option<i64>,
    #[serde(rename = "followingCount", default)]
    pub following_count: Option<i64>,
    #[serde(rename = "heartCount", default)]
    pub heart_count: Option<i64>,
    #[serde(rename = "videoCount", default)]
    pub video_count: Option<i64>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// Engagement statistics for a video.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoStats {
    #[serde(rename = "playCount", default)]
    pub play_count: Option<i64>,
    #[serde(rename = "diggCount", default)]
    pub digg_count: Option<i64>,
    #[serde(rename = "shareCount", default)]
    pub share_count: Option<i64>,
    #[serde(rename = "commentCount", default)]
    pub comment_count: Option<i64>,
    #[serde(rename = "collectCount", default)]
    pub collect_count: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoHashtag {
    pub name: Option<String>,
}

/// A single short video from the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoPayload {
    pub id: Option<String>,
    #[serde(rename = "desc", default)]
    pub description: Option<String>,
    #[serde(rename = "createTime", default)]
    pub create_time: Option<i64>,
    #[serde(default)]
    pub author: Option<VideoAuthor>,
    #[serde(default)]
    pub stats: Option<VideoStats>,
    #[serde(rename = "challenges", default)]
    pub hashtags: Vec<VideoHashtag>,
    #[serde(default)]
    pub language: Option<String>,
}

/// User profile response from `GET /user/:handle`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub user: VideoAuthor,
}

/// Paged search response for keyword/hashtag/user queries.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoSearchResponse {
    #[serde(rename = "itemList", default)]
    pub items: Vec<VideoPayload>,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(rename = "hasMore", default)]
    pub has_more: bool,
}
