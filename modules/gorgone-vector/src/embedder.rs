use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

// --- TextEmbedder trait ---

#[async_trait::async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// The model identifier recorded alongside cached vectors.
    fn model_id(&self) -> &str;
}

/// Embedding client over an OpenAI-compatible `/embeddings` endpoint. The
/// base URL is overridable so alternate providers slot in via config.
pub struct Embedder {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl Embedder {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }
}

#[async_trait::async_trait]
impl TextEmbedder for Embedder {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: texts,
        };

        tracing::debug!(model = %self.model, count = request.input.len(), "Embedding batch request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("Embedding API error ({status}): {error_text}"));
        }

        let parsed: EmbeddingResponse = response.json().await?;
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
