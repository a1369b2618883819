use crate::error::StorageError;
use crate::traits::ObjectStore;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Filesystem-backed object store rooted at a local directory.
///
/// This is the storage the server runs with before a cloud backend is
/// configured; it produces no shareable links.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name.trim_start_matches('/'))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(name);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(error) => Err(StorageError::Io(error)),
        }
    }

    async fn shared_link(&self, _name: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::LocalStore;
    use crate::error::StorageError;
    use crate::traits::ObjectStore;
    use tempfile::tempdir;

    #[tokio::test]
    async fn put_then_get_round_trips_bytes() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = LocalStore::new(dir.path());

        let blob = b"%PDF-1.4\n%fake".to_vec();
        store.put("uploads/a.pdf", &blob).await?;

        assert_eq!(store.get("uploads/a.pdf").await?, blob);
        Ok(())
    }

    #[tokio::test]
    async fn put_overwrites_existing_blob() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = LocalStore::new(dir.path());

        store.put("uploads/a.pdf", b"old").await?;
        store.put("uploads/a.pdf", b"new").await?;

        assert_eq!(store.get("uploads/a.pdf").await?, b"new");
        Ok(())
    }

    #[tokio::test]
    async fn missing_object_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = LocalStore::new(dir.path());

        assert!(matches!(
            store.get("uploads/missing.pdf").await,
            Err(StorageError::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn local_store_has_no_shareable_links() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = LocalStore::new(dir.path());
        store.put("uploads/a.pdf", b"x").await?;

        assert!(store.shared_link("uploads/a.pdf").await?.is_none());
        Ok(())
    }
}
