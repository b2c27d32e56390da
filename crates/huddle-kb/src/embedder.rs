use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{KbError, Result};

/// A batch embedding provider. Returning `Ok(None)` for a provider that is
/// configured but temporarily failing is not supported here: callers treat
/// any `Err` as "embeddings unavailable" and persist chunks with a null
/// embedding rather than blocking ingest.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn provider_name(&self) -> &str;
    fn model_name(&self) -> &str;
}

/// OpenAI-compatible `/v1/embeddings` client, grounded on the same
/// reqwest+bearer-auth shape used for chat completions.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl HttpEmbedder {
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = texts.len(), model = %self.model, "requesting embeddings");
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "input": texts,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(%status, body = %body, "embeddings API error");
            return Err(KbError::EmbeddingsUnavailable(format!(
                "status {status}: {body}"
            )));
        }

        let parsed: ApiResponse = resp
            .json()
            .await
            .map_err(|e| KbError::EmbeddingsUnavailable(e.to_string()))?;
        let mut by_index: Vec<(usize, Vec<f32>)> = parsed
            .data
            .into_iter()
            .map(|d| (d.index, d.embedding))
            .collect();
        by_index.sort_by_key(|(i, _)| *i);
        Ok(by_index.into_iter().map(|(_, v)| v).collect())
    }

    fn provider_name(&self) -> &str {
        "http"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    data: Vec<ApiEmbedding>,
}

#[derive(Deserialize)]
struct ApiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}
