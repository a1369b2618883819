use crate::error::StorageError;
use crate::traits::ObjectStore;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

const CONTENT_URL: &str = "https://content.dropboxapi.com/2";
const API_URL: &str = "https://api.dropboxapi.com/2";

/// Object store backed by the Dropbox HTTP API.
///
/// Blobs are written with overwrite mode, so storing under an existing name
/// replaces the prior revision. Links come from the sharing API; if a link
/// already exists for a path, the existing one is looked up and returned.
pub struct DropboxStore {
    access_token: String,
    client: Client,
}

impl DropboxStore {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            client: Client::new(),
        }
    }

    fn absolute(name: &str) -> String {
        format!("/{}", name.trim_start_matches('/'))
    }

    async fn existing_link(&self, path: &str) -> Result<Option<String>, StorageError> {
        let response = self
            .client
            .post(format!("{API_URL}/sharing/list_shared_links"))
            .bearer_auth(&self.access_token)
            .json(&json!({ "path": path, "direct_only": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let details = response.text().await.unwrap_or_default();
            return Err(StorageError::Backend {
                provider: "dropbox".to_string(),
                details: format!("{status}: {details}"),
            });
        }

        let payload: Value = response.json().await?;
        Ok(payload
            .pointer("/links/0/url")
            .and_then(Value::as_str)
            .map(|url| url.to_string()))
    }
}

#[async_trait]
impl ObjectStore for DropboxStore {
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let arg = json!({
            "path": Self::absolute(name),
            "mode": "overwrite",
            "mute": true,
        });

        let response = self
            .client
            .post(format!("{CONTENT_URL}/files/upload"))
            .bearer_auth(&self.access_token)
            .header("Dropbox-API-Arg", arg.to_string())
            .header("Content-Type", "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let details = response.text().await.unwrap_or_default();
            return Err(StorageError::Backend {
                provider: "dropbox".to_string(),
                details: format!("{status}: {details}"),
            });
        }

        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let arg = json!({ "path": Self::absolute(name) });

        let response = self
            .client
            .post(format!("{CONTENT_URL}/files/download"))
            .bearer_auth(&self.access_token)
            .header("Dropbox-API-Arg", arg.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            if details.contains("path/not_found") {
                return Err(StorageError::NotFound(name.to_string()));
            }
            return Err(StorageError::Backend {
                provider: "dropbox".to_string(),
                details: format!("{status}: {details}"),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn shared_link(&self, name: &str) -> Result<Option<String>, StorageError> {
        let path = Self::absolute(name);

        let response = self
            .client
            .post(format!("{API_URL}/sharing/create_shared_link_with_settings"))
            .bearer_auth(&self.access_token)
            .json(&json!({ "path": path }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let payload: Value = response.json().await?;
            return Ok(payload
                .pointer("/url")
                .and_then(Value::as_str)
                .map(|url| url.to_string()));
        }

        let details = response.text().await.unwrap_or_default();
        if details.contains("shared_link_already_exists") {
            return self.existing_link(&path).await;
        }

        Err(StorageError::Backend {
            provider: "dropbox".to_string(),
            details: format!("{status}: {details}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::DropboxStore;

    #[test]
    fn names_resolve_to_absolute_dropbox_paths() {
        assert_eq!(DropboxStore::absolute("uploads/a.pdf"), "/uploads/a.pdf");
        assert_eq!(DropboxStore::absolute("/uploads/a.pdf"), "/uploads/a.pdf");
    }
}
