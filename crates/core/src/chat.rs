use crate::error::QueryError;
use crate::models::ChatMessage;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const MAX_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> Result<String, QueryError>;
}

#[async_trait]
impl<T: ChatModel + ?Sized> ChatModel for Arc<T> {
    async fn complete(
        &self,
        system: &str,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> Result<String, QueryError> {
        (**self).complete(system, messages, max_tokens).await
    }
}

/// Client for an OpenAI-compatible chat-completions endpoint.
///
/// Rate/quota exhaustion surfaces as [`QueryError::RateLimited`] so the
/// caller can tell the user to retry later; transient 5xx responses retry
/// with a short backoff.
pub struct OpenAiChatClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiChatClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, QueryError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            client,
        })
    }

    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{base}/chat/completions")
        }
    }

    async fn request(&self, body: &Value) -> Result<reqwest::Response, reqwest::Error> {
        let mut request = self.client.post(self.endpoint()).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request.send().await
    }
}

fn classify_failure(status: StatusCode, body: &str) -> QueryError {
    if status == StatusCode::TOO_MANY_REQUESTS || body.contains("insufficient_quota") {
        QueryError::RateLimited(format!("chat provider returned {status}"))
    } else {
        QueryError::Backend(format!("{status}: {body}"))
    }
}

fn parse_answer(payload: &Value) -> Result<String, QueryError> {
    payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|content| content.to_string())
        .ok_or_else(|| QueryError::Backend("completion response has no content".to_string()))
}

#[async_trait]
impl ChatModel for OpenAiChatClient {
    async fn complete(
        &self,
        system: &str,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> Result<String, QueryError> {
        let mut wire_messages = vec![json!({"role": "system", "content": system})];
        wire_messages.extend(messages.iter().map(|message| json!(message)));

        let body = json!({
            "model": self.model,
            "messages": wire_messages,
            "temperature": 0.3,
            "max_tokens": max_tokens,
        });

        let mut last_error = QueryError::Backend("no completion attempt made".to_string());

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_secs(1u64 << (attempt - 1))).await;
            }

            let response = match self.request(&body).await {
                Ok(response) => response,
                Err(error) => {
                    warn!(attempt, %error, "chat request failed, retrying");
                    last_error = QueryError::Http(error);
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                let payload: Value = response.json().await?;
                return parse_answer(&payload);
            }

            let body_text = response.text().await.unwrap_or_default();
            let classified = classify_failure(status, &body_text);

            // Quota exhaustion and client errors are final; only server
            // errors are worth another attempt.
            if !status.is_server_error() {
                return Err(classified);
            }

            warn!(attempt, %status, "chat endpoint returned server error");
            last_error = classified;
        }

        Err(last_error)
    }
}
