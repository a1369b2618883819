use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} request failed: {details}")]
    Backend { provider: String, details: String },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("index request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embeddings rate limited: {0}")]
    RateLimited(String),

    #[error("embeddings request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("ocr failed: {0}")]
    OcrFailed(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbedError),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbedError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat backend failed: {0}")]
    Backend(String),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
