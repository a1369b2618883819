use crate::error::IngestError;
use base64::{engine::general_purpose::STANDARD, Engine};
use lopdf::Document;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Outcome of running a document through extraction.
///
/// `Empty` means the document parsed but carries no recoverable text;
/// `Failed` means neither direct extraction nor OCR could read it. Callers
/// treat both as "nothing indexable" but report them differently.
#[derive(Debug, Clone)]
pub enum ExtractionOutcome {
    Extracted { text: String, via_ocr: bool },
    Empty,
    Failed { reason: String },
}

pub trait PdfParser {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Default)]
pub struct LopdfParser;

impl PdfParser for LopdfParser {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load_mem(bytes).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            // A single unreadable page contributes nothing; the rest of the
            // document still extracts.
            match document.extract_text(&[page_no]) {
                Ok(text) => pages.push(PageText {
                    number: page_no,
                    text,
                }),
                Err(error) => {
                    warn!(page = page_no, %error, "page text extraction failed");
                }
            }
        }

        Ok(pages)
    }
}

#[derive(Debug, Clone, Serialize)]
struct OcrRequest {
    pdf_base64: String,
    filename: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrResponse {
    pages: Option<Vec<OcrPage>>,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrPage {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    text: Option<String>,
}

/// Client for a remote OCR service that rasterizes PDF pages and returns
/// recognized text per page.
pub struct OcrClient {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl OcrClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key,
            client: Client::new(),
        }
    }

    pub async fn recognize(
        &self,
        pdf: &[u8],
        filename: &str,
    ) -> Result<Vec<PageText>, IngestError> {
        let payload = OcrRequest {
            pdf_base64: STANDARD.encode(pdf),
            filename: filename.to_string(),
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(IngestError::OcrFailed(format!(
                "ocr request to {} returned {}",
                self.endpoint,
                response.status()
            )));
        }

        let payload: OcrResponse = response.json().await?;
        Ok(payload_to_pages(&payload))
    }
}

fn payload_to_pages(payload: &OcrResponse) -> Vec<PageText> {
    if let Some(listed) = &payload.pages {
        let listed = listed
            .iter()
            .filter_map(|page| {
                let text = page.text.as_ref().map(|value| value.trim().to_string());
                text.and_then(|normalized| {
                    if normalized.is_empty() {
                        None
                    } else {
                        Some(PageText {
                            number: page.page.unwrap_or(1),
                            text: normalized,
                        })
                    }
                })
            })
            .collect::<Vec<_>>();

        if !listed.is_empty() {
            return listed;
        }
    }

    if let Some(raw_text) = &payload.text {
        return raw_text
            .split('\u{000c}')
            .enumerate()
            .filter_map(|(index, chunk)| {
                let normalized = chunk.trim().to_string();
                if normalized.is_empty() {
                    None
                } else {
                    Some(PageText {
                        number: (index + 1) as u32,
                        text: normalized,
                    })
                }
            })
            .collect();
    }

    Vec::new()
}

/// Turns raw PDF bytes into text, preferring the document's own text layer
/// and falling back to OCR when that layer is empty or unreadable.
pub struct TextExtractor {
    parser: Box<dyn PdfParser + Send + Sync>,
    ocr: Option<OcrClient>,
}

impl TextExtractor {
    pub fn new(ocr: Option<OcrClient>) -> Self {
        Self {
            parser: Box::new(LopdfParser),
            ocr,
        }
    }

    pub fn with_parser(parser: Box<dyn PdfParser + Send + Sync>, ocr: Option<OcrClient>) -> Self {
        Self { parser, ocr }
    }

    pub async fn extract(&self, bytes: &[u8], filename: &str) -> ExtractionOutcome {
        match self.parser.extract_pages(bytes) {
            Ok(pages) => {
                let text = join_pages(&pages);
                if !text.trim().is_empty() {
                    return ExtractionOutcome::Extracted {
                        text,
                        via_ocr: false,
                    };
                }
                self.recognize_fallback(bytes, filename, None).await
            }
            Err(error) => {
                warn!(filename, %error, "direct pdf extraction failed");
                self.recognize_fallback(bytes, filename, Some(error.to_string()))
                    .await
            }
        }
    }

    async fn recognize_fallback(
        &self,
        bytes: &[u8],
        filename: &str,
        parse_failure: Option<String>,
    ) -> ExtractionOutcome {
        let Some(ocr) = &self.ocr else {
            return match parse_failure {
                Some(reason) => ExtractionOutcome::Failed { reason },
                None => ExtractionOutcome::Empty,
            };
        };

        match ocr.recognize(bytes, filename).await {
            Ok(pages) if !pages.is_empty() => ExtractionOutcome::Extracted {
                text: join_pages(&pages),
                via_ocr: true,
            },
            Ok(_) => ExtractionOutcome::Empty,
            Err(ocr_error) => {
                warn!(filename, %ocr_error, "ocr fallback failed");
                let reason = match parse_failure {
                    Some(parse_error) => format!("{parse_error}; ocr fallback: {ocr_error}"),
                    None => ocr_error.to_string(),
                };
                ExtractionOutcome::Failed { reason }
            }
        }
    }
}

fn join_pages(pages: &[PageText]) -> String {
    let mut ordered: Vec<&PageText> = pages.iter().collect();
    ordered.sort_by_key(|page| page.number);
    ordered
        .iter()
        .map(|page| page.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::{
        join_pages, payload_to_pages, ExtractionOutcome, OcrPage, OcrResponse, PageText, PdfParser,
        TextExtractor,
    };
    use crate::error::IngestError;

    struct FakeParser {
        pages: Result<Vec<PageText>, String>,
    }

    impl PdfParser for FakeParser {
        fn extract_pages(&self, _bytes: &[u8]) -> Result<Vec<PageText>, IngestError> {
            match &self.pages {
                Ok(pages) => Ok(pages.clone()),
                Err(reason) => Err(IngestError::PdfParse(reason.clone())),
            }
        }
    }

    fn page(number: u32, text: &str) -> PageText {
        PageText {
            number,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn text_layer_wins_without_ocr() {
        let extractor = TextExtractor::with_parser(
            Box::new(FakeParser {
                pages: Ok(vec![page(2, "second"), page(1, "first")]),
            }),
            None,
        );

        match extractor.extract(b"%PDF", "a.pdf").await {
            ExtractionOutcome::Extracted { text, via_ocr } => {
                assert_eq!(text, "first\nsecond");
                assert!(!via_ocr);
            }
            other => panic!("expected extracted text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn whitespace_only_text_layer_is_empty_without_ocr() {
        let extractor = TextExtractor::with_parser(
            Box::new(FakeParser {
                pages: Ok(vec![page(1, "  \n\t ")]),
            }),
            None,
        );

        assert!(matches!(
            extractor.extract(b"%PDF", "a.pdf").await,
            ExtractionOutcome::Empty
        ));
    }

    #[tokio::test]
    async fn parse_failure_without_ocr_is_failed() {
        let extractor = TextExtractor::with_parser(
            Box::new(FakeParser {
                pages: Err("broken xref".to_string()),
            }),
            None,
        );

        match extractor.extract(b"not a pdf", "a.pdf").await {
            ExtractionOutcome::Failed { reason } => assert!(reason.contains("broken xref")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn corrupt_bytes_fail_with_real_parser() {
        let extractor = TextExtractor::new(None);
        assert!(matches!(
            extractor.extract(b"%PDF-1.4\n%broken", "a.pdf").await,
            ExtractionOutcome::Failed { .. }
        ));
    }

    #[test]
    fn ocr_payload_with_pages_keeps_only_nonempty_text() {
        let response = OcrResponse {
            pages: Some(vec![
                OcrPage {
                    page: Some(2),
                    text: Some("  ".to_string()),
                },
                OcrPage {
                    page: Some(3),
                    text: Some("Page 3".to_string()),
                },
            ]),
            text: None,
        };

        let pages = payload_to_pages(&response);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].number, 3);
        assert_eq!(pages[0].text, "Page 3");
    }

    #[test]
    fn ocr_payload_fallback_text_splits_on_form_feed() {
        let response = OcrResponse {
            pages: None,
            text: Some("First\u{000C}Second\n".to_string()),
        };

        let pages = payload_to_pages(&response);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].text, "First");
        assert_eq!(pages[1].number, 2);
    }

    #[test]
    fn ocr_payload_with_no_text_is_empty() {
        let response = OcrResponse {
            pages: None,
            text: None,
        };
        assert!(payload_to_pages(&response).is_empty());
    }

    #[test]
    fn pages_join_in_page_order() {
        let joined = join_pages(&[page(3, "c"), page(1, "a"), page(2, "b")]);
        assert_eq!(joined, "a\nb\nc");
    }
}
