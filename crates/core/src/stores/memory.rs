use crate::error::IndexError;
use crate::models::Passage;
use crate::traits::VectorIndex;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::RwLock;

struct StoredText {
    id: String,
    text: String,
    vector: Vec<f32>,
}

/// In-process vector index with brute-force cosine search.
///
/// Lives for the process lifetime only; nothing is persisted. Entries are
/// keyed by a digest of their text, so adding identical text replaces the
/// existing entry.
pub struct MemoryIndex {
    entries: RwLock<Vec<StoredText>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn content_id(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn add(&self, text: &str, embedding: &[f32]) -> Result<(), IndexError> {
        let id = content_id(text);
        let mut entries = self.entries.write().unwrap();
        entries.retain(|entry| entry.id != id);
        entries.push(StoredText {
            id,
            text: text.to_string(),
            vector: embedding.to_vec(),
        });
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<Passage>, IndexError> {
        let entries = self.entries.read().unwrap();
        let mut passages: Vec<Passage> = entries
            .iter()
            .map(|entry| Passage {
                id: entry.id.clone(),
                text: entry.text.clone(),
                score: cosine_similarity(query_vector, &entry.vector) as f64,
                source: "memory".to_string(),
            })
            .collect();

        passages.sort_by(|left, right| {
            right
                .score
                .partial_cmp(&left.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        passages.truncate(top_k);
        Ok(passages)
    }
}

#[cfg(test)]
mod tests {
    use super::{cosine_similarity, MemoryIndex};
    use crate::traits::VectorIndex;

    #[tokio::test]
    async fn search_ranks_by_similarity() -> Result<(), Box<dyn std::error::Error>> {
        let index = MemoryIndex::new();
        index.add("about cats", &[1.0, 0.0]).await?;
        index.add("about dogs", &[0.0, 1.0]).await?;

        let hits = index.search(&[0.9, 0.1], 2).await?;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "about cats");
        assert!(hits[0].score > hits[1].score);
        Ok(())
    }

    #[tokio::test]
    async fn adding_identical_text_upserts() -> Result<(), Box<dyn std::error::Error>> {
        let index = MemoryIndex::new();
        index.add("same text", &[1.0, 0.0]).await?;
        index.add("same text", &[0.0, 1.0]).await?;

        assert_eq!(index.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn empty_index_returns_no_passages() -> Result<(), Box<dyn std::error::Error>> {
        let index = MemoryIndex::new();
        assert!(index.search(&[1.0, 0.0], 1).await?.is_empty());
        Ok(())
    }

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
