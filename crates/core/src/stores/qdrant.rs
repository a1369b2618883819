use crate::error::IndexError;
use crate::models::Passage;
use crate::traits::VectorIndex;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Vector index backed by the Qdrant HTTP API.
///
/// Point ids derive from a digest of the indexed text, so re-indexing the
/// same text upserts the existing point instead of duplicating it.
pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
    vector_size: usize,
}

impl QdrantStore {
    pub fn new(
        endpoint: impl Into<String>,
        collection: impl Into<String>,
        vector_size: usize,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            collection: collection.into(),
            client: Client::new(),
            vector_size,
        }
    }

    /// Create the collection if it does not exist yet.
    pub async fn ensure_collection(&self) -> Result<(), IndexError> {
        let response = self
            .client
            .put(format!("{}/collections/{}", self.endpoint, self.collection))
            .json(&json!({
                "vectors": { "size": self.vector_size, "distance": "Cosine" },
            }))
            .send()
            .await?;

        // 409 means the collection already exists.
        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::CONFLICT {
            return Err(IndexError::BackendResponse {
                backend: "qdrant".to_string(),
                details: status.to_string(),
            });
        }

        Ok(())
    }

    fn point_id(text: &str) -> String {
        let digest = Sha256::digest(text.as_bytes());
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Uuid::from_bytes(bytes).to_string()
    }
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn add(&self, text: &str, embedding: &[f32]) -> Result<(), IndexError> {
        if embedding.len() != self.vector_size {
            return Err(IndexError::Request(format!(
                "embedding dimension {} != {}",
                embedding.len(),
                self.vector_size
            )));
        }

        let point = json!({
            "id": Self::point_id(text),
            "vector": embedding,
            "payload": {
                "text": text,
                "indexed_at": Utc::now().to_rfc3339(),
            },
        });

        let response = self
            .client
            .put(format!(
                "{}/collections/{}/points?wait=true",
                self.endpoint, self.collection
            ))
            .json(&json!({ "points": [point] }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<Passage>, IndexError> {
        if query_vector.len() != self.vector_size {
            return Err(IndexError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.vector_size
            )));
        }

        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/search",
                self.endpoint, self.collection
            ))
            .json(&json!({
                "vector": query_vector,
                "limit": top_k,
                "with_payload": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut passages = Vec::new();
        for hit in hits {
            let id = hit
                .pointer("/id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let text = hit
                .pointer("/payload/text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);

            passages.push(Passage {
                id,
                text,
                score,
                source: "qdrant".to_string(),
            });
        }

        Ok(passages)
    }
}

#[cfg(test)]
mod tests {
    use super::QdrantStore;

    #[test]
    fn point_ids_are_deterministic_per_text() {
        let first = QdrantStore::point_id("Invoice #42");
        let second = QdrantStore::point_id("Invoice #42");
        let other = QdrantStore::point_id("Invoice #43");

        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn point_ids_are_valid_uuids() {
        let id = QdrantStore::point_id("some text");
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }
}
