use crate::error::EmbedError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;

const MAX_ATTEMPTS: u32 = 4;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Arc<T> {
    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        (**self).embed(text).await
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible embeddings endpoint.
///
/// Transient failures (429 and 5xx) retry with exponential backoff; other
/// client errors fail immediately.
pub struct OpenAiEmbedder {
    base_url: String,
    model: String,
    api_key: String,
    dimensions: usize,
    client: Client,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
            dimensions,
            client: Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }

    async fn request(&self, text: &str) -> Result<reqwest::Response, reqwest::Error> {
        self.client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "input": [text],
            }))
            .send()
            .await
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

async fn backoff(attempt: u32) {
    let secs = 1u64 << attempt.min(5);
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut last_status = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                backoff(attempt - 1).await;
            }

            let response = match self.request(text).await {
                Ok(response) => response,
                Err(error) => {
                    warn!(attempt, %error, "embeddings request failed, retrying");
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                let parsed: EmbeddingsResponse = response.json().await?;
                return parsed
                    .data
                    .into_iter()
                    .next()
                    .map(|row| row.embedding)
                    .ok_or_else(|| EmbedError::Request("empty embeddings response".to_string()));
            }

            if !is_retryable(status) {
                let body = response.text().await.unwrap_or_default();
                return Err(EmbedError::Request(format!("{status}: {body}")));
            }

            warn!(attempt, %status, "embeddings endpoint returned transient error");
            last_status = Some(status);
        }

        match last_status {
            Some(status) if status == StatusCode::TOO_MANY_REQUESTS => Err(
                EmbedError::RateLimited(format!("gave up after {MAX_ATTEMPTS} attempts")),
            ),
            Some(status) => Err(EmbedError::Request(format!(
                "gave up after {MAX_ATTEMPTS} attempts, last status {status}"
            ))),
            None => Err(EmbedError::Request(format!(
                "gave up after {MAX_ATTEMPTS} attempts, no response"
            ))),
        }
    }
}
