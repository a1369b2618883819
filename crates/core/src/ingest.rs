use crate::error::IngestError;
use crate::extractor::{ExtractionOutcome, TextExtractor};
use crate::models::IngestReceipt;
use crate::embeddings::Embedder;
use crate::traits::{ObjectStore, VectorIndex};
use std::path::Path;
use tracing::{info, warn};

const UPLOAD_NAMESPACE: &str = "uploads";

/// Runs an uploaded document through storage, extraction, and indexing.
///
/// Extraction failures degrade the receipt message rather than failing the
/// upload; storage and indexing failures propagate to the caller.
pub struct IngestPipeline<S, E, V> {
    store: S,
    embedder: E,
    index: V,
    extractor: TextExtractor,
}

impl<S, E, V> IngestPipeline<S, E, V>
where
    S: ObjectStore,
    E: Embedder,
    V: VectorIndex,
{
    pub fn new(store: S, embedder: E, index: V, extractor: TextExtractor) -> Self {
        Self {
            store,
            embedder,
            index,
            extractor,
        }
    }

    pub async fn ingest(&self, filename: &str, bytes: &[u8]) -> Result<IngestReceipt, IngestError> {
        let name = validate_filename(filename)?;
        let blob_path = format!("{UPLOAD_NAMESPACE}/{name}");

        self.store.put(&blob_path, bytes).await?;

        let outcome = self.extractor.extract(bytes, &name).await;
        let (message, indexed) = match outcome {
            ExtractionOutcome::Extracted { text, via_ocr } => {
                let vector = self.embedder.embed(&text).await?;
                self.index.add(&text, &vector).await?;

                let text_path = format!("{UPLOAD_NAMESPACE}/{}.txt", stem(&name));
                self.store.put(&text_path, text.as_bytes()).await?;

                info!(filename = %name, via_ocr, chars = text.len(), "document indexed");
                let message = if via_ocr {
                    "File uploaded and indexed (text recovered via OCR)".to_string()
                } else {
                    "File uploaded and indexed successfully".to_string()
                };
                (message, true)
            }
            ExtractionOutcome::Empty => (
                "File uploaded but no text could be extracted".to_string(),
                false,
            ),
            ExtractionOutcome::Failed { reason } => {
                warn!(filename = %name, %reason, "extraction failed, storing blob only");
                (
                    "File uploaded but text extraction failed".to_string(),
                    false,
                )
            }
        };

        let link = self.store.shared_link(&blob_path).await?;

        Ok(IngestReceipt {
            filename: name,
            message,
            link,
            indexed,
        })
    }
}

/// Strip any path components and require a `.pdf` extension.
fn validate_filename(filename: &str) -> Result<String, IngestError> {
    let name = Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::InvalidDocument(format!("unusable filename: {filename}")))?;

    if !name.to_ascii_lowercase().ends_with(".pdf") {
        return Err(IngestError::InvalidDocument(format!(
            "only pdf uploads are accepted, got: {name}"
        )));
    }

    Ok(name.to_string())
}

fn stem(name: &str) -> &str {
    if name.to_ascii_lowercase().ends_with(".pdf") {
        &name[..name.len() - 4]
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_filename, IngestPipeline};
    use crate::error::{EmbedError, IngestError};
    use crate::extractor::{PageText, PdfParser, TextExtractor};
    use crate::embeddings::Embedder;
    use crate::stores::{LocalStore, MemoryIndex};
    use crate::traits::{ObjectStore, VectorIndex};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tempfile::tempdir;

    struct FakeParser {
        pages: Vec<PageText>,
    }

    impl PdfParser for FakeParser {
        fn extract_pages(&self, _bytes: &[u8]) -> Result<Vec<PageText>, IngestError> {
            Ok(self.pages.clone())
        }
    }

    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        fn dimensions(&self) -> usize {
            4
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
            // Deterministic toy embedding so similar texts stay comparable.
            let mut vector = vec![0.0f32; 4];
            for (index, byte) in text.bytes().enumerate() {
                vector[index % 4] += byte as f32;
            }
            Ok(vector)
        }
    }

    fn extractor_with_text(text: &str) -> TextExtractor {
        TextExtractor::with_parser(
            Box::new(FakeParser {
                pages: vec![PageText {
                    number: 1,
                    text: text.to_string(),
                }],
            }),
            None,
        )
    }

    fn pipeline(
        root: &std::path::Path,
        index: Arc<MemoryIndex>,
        text: &str,
    ) -> IngestPipeline<LocalStore, FakeEmbedder, Arc<MemoryIndex>> {
        IngestPipeline::new(
            LocalStore::new(root),
            FakeEmbedder,
            index,
            extractor_with_text(text),
        )
    }

    #[tokio::test]
    async fn upload_stores_blob_and_indexes_text() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let index = Arc::new(MemoryIndex::new());
        let pipeline = pipeline(dir.path(), index.clone(), "Invoice #42 due in May");

        let blob = b"%PDF-1.4 fake".to_vec();
        let receipt = pipeline.ingest("invoice.pdf", &blob).await?;

        assert!(receipt.indexed);
        assert!(receipt.message.contains("indexed"));
        assert_eq!(index.len(), 1);

        // Round trip: the stored blob is byte-identical, and the derived
        // text lands next to it.
        let store = LocalStore::new(dir.path());
        assert_eq!(store.get("uploads/invoice.pdf").await?, blob);
        assert_eq!(
            store.get("uploads/invoice.txt").await?,
            b"Invoice #42 due in May"
        );
        Ok(())
    }

    #[tokio::test]
    async fn indexed_text_is_retrievable_by_similarity() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempdir()?;
        let index = Arc::new(MemoryIndex::new());
        let pipeline = pipeline(dir.path(), index.clone(), "Invoice #42 due in May");

        pipeline.ingest("invoice.pdf", b"%PDF fake").await?;

        let query_vector = FakeEmbedder.embed("What invoice number?").await?;
        let hits = index.search(&query_vector, 1).await?;
        assert_eq!(hits.len(), 1);
        assert!(hits[0].text.contains("Invoice #42"));
        Ok(())
    }

    #[tokio::test]
    async fn reingesting_identical_text_does_not_duplicate(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let index = Arc::new(MemoryIndex::new());
        let pipeline = pipeline(dir.path(), index.clone(), "same content");

        pipeline.ingest("a.pdf", b"%PDF fake").await?;
        pipeline.ingest("a.pdf", b"%PDF fake").await?;

        assert_eq!(index.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn empty_extraction_degrades_but_succeeds() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let index = Arc::new(MemoryIndex::new());
        let pipeline = pipeline(dir.path(), index.clone(), "   ");

        let receipt = pipeline.ingest("scan.pdf", b"%PDF fake").await?;

        assert!(!receipt.indexed);
        assert!(receipt.message.contains("no text could be extracted"));
        assert_eq!(index.len(), 0);

        // The blob is still stored, but no derived text is written.
        let store = LocalStore::new(dir.path());
        assert!(store.get("uploads/scan.pdf").await.is_ok());
        assert!(store.get("uploads/scan.txt").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn non_pdf_uploads_are_rejected() {
        let dir = tempdir().expect("tempdir");
        let index = Arc::new(MemoryIndex::new());
        let pipeline = pipeline(dir.path(), index, "irrelevant");

        let result = pipeline.ingest("notes.txt", b"plain text").await;
        assert!(matches!(result, Err(IngestError::InvalidDocument(_))));
    }

    #[test]
    fn filenames_are_stripped_to_their_final_component() {
        assert_eq!(
            validate_filename("../../etc/passwd.pdf").expect("valid"),
            "passwd.pdf"
        );
        assert_eq!(validate_filename("Report.PDF").expect("valid"), "Report.PDF");
        assert!(validate_filename("image.png").is_err());
    }
}
