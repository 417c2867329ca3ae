use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Query object for the article search endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleQuery {
    pub q: String,
    pub page: u32,
    #[serde(rename = "pageSize")]
    pub page_size: u32,
    #[serde(rename = "sortBy")]
    pub sort_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(rename = "publishedAfter", skip_serializing_if = "Option::is_none")]
    pub published_after: Option<DateTime<Utc>>,
}

impl ArticleQuery {
    pub fn new(q: impl Into<String>, page: u32, page_size: u32) -> Self {
        Self {
            q: q.into(),
            page,
            page_size: page_size.min(crate::MAX_PAGE_SIZE),
            sort_by: "publishedAt".to_string(),
            language: None,
            published_after: None,
        }
    }
}

/// A single news article from the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticlePayload {
    #[serde(rename = "articleId", default)]
    pub article_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(rename = "publishedAt", default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(rename = "sourceName", default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArticleSearchResponse {
    #[serde(default)]
    pub articles: Vec<ArticlePayload>,
    #[serde(rename = "totalResults", default)]
    pub total_results: u64,
}
