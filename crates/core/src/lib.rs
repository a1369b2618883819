pub mod answerer;
pub mod cache;
pub mod chat;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod stores;
pub mod traits;

pub use answerer::{AnswererOptions, QueryAnswerer};
pub use cache::AnswerCache;
pub use chat::{ChatModel, OpenAiChatClient};
pub use embeddings::{Embedder, OpenAiEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{EmbedError, IndexError, IngestError, QueryError, StorageError};
pub use extractor::{
    ExtractionOutcome, LopdfParser, OcrClient, PageText, PdfParser, TextExtractor,
};
pub use ingest::IngestPipeline;
pub use models::{ChatMessage, IngestReceipt, Passage};
pub use stores::{DropboxStore, LocalStore, MemoryIndex, QdrantStore};
pub use traits::{ObjectStore, VectorIndex};
