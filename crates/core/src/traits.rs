use crate::error::{IndexError, StorageError};
use crate::models::Passage;
use async_trait::async_trait;
use std::sync::Arc;

/// Remote blob storage keyed by path-like names under the upload namespace.
///
/// Storing under an existing name overwrites the prior blob.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError>;

    async fn get(&self, name: &str) -> Result<Vec<u8>, StorageError>;

    /// Produce a shareable link for a stored blob, where the backend
    /// supports one.
    async fn shared_link(&self, name: &str) -> Result<Option<String>, StorageError>;
}

/// A similarity-searchable corpus of indexed text.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn add(&self, text: &str, embedding: &[f32]) -> Result<(), IndexError>;

    async fn search(&self, query_vector: &[f32], top_k: usize)
        -> Result<Vec<Passage>, IndexError>;
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        (**self).put(name, bytes).await
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        (**self).get(name).await
    }

    async fn shared_link(&self, name: &str) -> Result<Option<String>, StorageError> {
        (**self).shared_link(name).await
    }
}

#[async_trait]
impl<T: VectorIndex + ?Sized> VectorIndex for Arc<T> {
    async fn add(&self, text: &str, embedding: &[f32]) -> Result<(), IndexError> {
        (**self).add(text, embedding).await
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<Passage>, IndexError> {
        (**self).search(query_vector, top_k).await
    }
}
