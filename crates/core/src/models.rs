use serde::{Deserialize, Serialize};

/// One message handed to the chat-completion provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A retrieved unit of indexed text, ranked by similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub id: String,
    pub text: String,
    pub score: f64,
    pub source: String,
}

/// What an upload produced, reported back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReceipt {
    pub filename: String,
    pub message: String,
    pub link: Option<String>,
    pub indexed: bool,
}
