mod server;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, ValueEnum};
use pdf_chat_core::{
    AnswererOptions, ChatModel, DropboxStore, Embedder, IngestPipeline, LocalStore, MemoryIndex,
    ObjectStore, OcrClient, OpenAiChatClient, OpenAiEmbedder, QdrantStore, QueryAnswerer,
    TextExtractor, VectorIndex, DEFAULT_EMBEDDING_DIMENSIONS,
};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-chat-server", version)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "PDF_CHAT_BIND", default_value = "127.0.0.1:8000")]
    bind: String,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    openai_url: String,

    /// API key for the embeddings and chat endpoints
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: String,

    /// Chat-completion model
    #[arg(long, default_value = "gpt-3.5-turbo")]
    chat_model: String,

    /// Embedding model
    #[arg(long, default_value = "text-embedding-3-small")]
    embedding_model: String,

    /// Embedding vector dimensionality
    #[arg(long, default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    embedding_dimensions: usize,

    /// Where uploaded blobs are kept
    #[arg(long, value_enum, default_value = "local")]
    storage_backend: StorageBackend,

    /// Root directory for local storage
    #[arg(long, default_value = "data")]
    storage_root: String,

    /// Dropbox access token (required for dropbox storage)
    #[arg(long, env = "DROPBOX_ACCESS_TOKEN", hide_env_values = true)]
    dropbox_token: Option<String>,

    /// Where indexed vectors are kept
    #[arg(long, value_enum, default_value = "memory")]
    index_backend: IndexBackend,

    /// Qdrant base URL
    #[arg(long, default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, default_value = "pdf_chat")]
    qdrant_collection: String,

    /// OCR service endpoint for scanned documents
    #[arg(long, env = "OCR_ENDPOINT")]
    ocr_endpoint: Option<String>,

    /// API key for the OCR service
    #[arg(long, env = "OCR_API_KEY", hide_env_values = true)]
    ocr_api_key: Option<String>,

    /// Number of passages retrieved per question
    #[arg(long, default_value = "1")]
    top_k: usize,

    /// Answer cache capacity
    #[arg(long, default_value = "256")]
    cache_capacity: usize,

    /// Maximum tokens per generated answer
    #[arg(long, default_value = "512")]
    max_answer_tokens: u32,
}

#[derive(Clone, Copy, ValueEnum)]
enum StorageBackend {
    Local,
    Dropbox,
}

#[derive(Clone, Copy, ValueEnum)]
enum IndexBackend {
    Memory,
    Qdrant,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(
        &cli.openai_url,
        &cli.embedding_model,
        &cli.openai_api_key,
        cli.embedding_dimensions,
    ));

    let chat: Arc<dyn ChatModel> = Arc::new(
        OpenAiChatClient::new(
            &cli.openai_url,
            &cli.chat_model,
            Some(cli.openai_api_key.clone()),
        )
        .map_err(|error| anyhow::anyhow!(error.to_string()))?,
    );

    let store: Arc<dyn ObjectStore> = match cli.storage_backend {
        StorageBackend::Local => Arc::new(LocalStore::new(&cli.storage_root)),
        StorageBackend::Dropbox => {
            let token = cli
                .dropbox_token
                .clone()
                .context("dropbox storage needs --dropbox-token or DROPBOX_ACCESS_TOKEN")?;
            Arc::new(DropboxStore::new(token))
        }
    };

    let index: Arc<dyn VectorIndex> = match cli.index_backend {
        IndexBackend::Memory => Arc::new(MemoryIndex::new()),
        IndexBackend::Qdrant => {
            let qdrant = QdrantStore::new(
                &cli.qdrant_url,
                &cli.qdrant_collection,
                cli.embedding_dimensions,
            );
            qdrant
                .ensure_collection()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            Arc::new(qdrant)
        }
    };

    let ocr = cli
        .ocr_endpoint
        .as_ref()
        .map(|endpoint| OcrClient::new(endpoint, cli.ocr_api_key.clone()));

    let pipeline = IngestPipeline::new(
        store,
        embedder.clone(),
        index.clone(),
        TextExtractor::new(ocr),
    );

    let options = AnswererOptions {
        cache_capacity: NonZeroUsize::new(cli.cache_capacity)
            .context("cache capacity must be at least 1")?,
        top_k: cli.top_k,
        max_tokens: cli.max_answer_tokens,
    };
    let answerer = QueryAnswerer::new(embedder, index, chat, options);

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        bind = %cli.bind,
        "pdf-chat-server boot"
    );

    server::run(&cli.bind, pipeline, answerer).await
}
