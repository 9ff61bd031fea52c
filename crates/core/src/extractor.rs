use crate::error::{IngestError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use lopdf::Document;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// One extracted page; page numbers are 1-indexed.
#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// File types the pipeline accepts, judged by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
    Unsupported,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Self {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return DocumentKind::Unsupported;
        };

        match extension.to_ascii_lowercase().as_str() {
            "pdf" => DocumentKind::Pdf,
            "png" | "jpg" | "jpeg" | "tiff" | "bmp" => DocumentKind::Image,
            _ => DocumentKind::Unsupported,
        }
    }
}

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    /// Per-page text-layer extraction. Pages without readable text are
    /// omitted; a PDF whose pages are all empty yields an empty sequence.
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        Ok(pages)
    }
}

/// Narrow interface over the external image-to-text collaborator.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, path: &Path) -> Result<String>;
}

#[derive(Debug, Clone, Serialize)]
struct OcrRequest {
    image_base64: String,
    source_path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrResponse {
    text: Option<String>,
}

/// OCR delegated to an HTTP endpoint that accepts a base64 image payload
/// and answers `{ "text": "..." }`.
#[derive(Debug, Clone)]
pub struct HttpOcrEngine {
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl HttpOcrEngine {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key,
        }
    }

    /// Reads `DOC_CHAT_OCR_ENDPOINT` / `DOC_CHAT_OCR_API_KEY`; `None` when
    /// no endpoint is configured.
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("DOC_CHAT_OCR_ENDPOINT").ok()?;
        let endpoint = endpoint.trim().to_string();
        if endpoint.is_empty() {
            return None;
        }

        let api_key = std::env::var("DOC_CHAT_OCR_API_KEY").ok().and_then(|value| {
            let key = value.trim().to_string();
            if key.is_empty() {
                None
            } else {
                Some(key)
            }
        });

        Some(Self { endpoint, api_key })
    }

    fn recognize_blocking(&self, path: &Path) -> Result<String> {
        let image = std::fs::read(path).map_err(IngestError::Io)?;
        let payload = OcrRequest {
            image_base64: STANDARD.encode(image),
            source_path: path.to_string_lossy().to_string(),
        };

        let mut request = Client::new()
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send()?;
        if !response.status().is_success() {
            return Err(IngestError::OcrFailed(format!(
                "OCR request to {} returned {}",
                self.endpoint,
                response.status()
            )));
        }

        let payload: OcrResponse = response.json()?;
        Ok(payload.text.unwrap_or_default())
    }
}

impl OcrEngine for HttpOcrEngine {
    fn recognize(&self, path: &Path) -> Result<String> {
        tokio::task::block_in_place(|| self.recognize_blocking(path))
    }
}

/// Placeholder engine for setups without an OCR endpoint; every image
/// upload degrades to a per-file error status.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledOcr;

impl OcrEngine for DisabledOcr {
    fn recognize(&self, _path: &Path) -> Result<String> {
        Err(IngestError::OcrFailed(
            "no OCR endpoint configured (set DOC_CHAT_OCR_ENDPOINT)".to_string(),
        ))
    }
}

/// Extract (text, page) pairs from a single uploaded file.
///
/// PDFs produce one entry per readable page with strictly increasing page
/// numbers. Images go through OCR as a single page numbered 1; empty OCR
/// output yields an empty sequence. Unsupported extensions yield an empty
/// sequence and leave it to the caller to surface "no text extracted".
pub fn extract_document(path: &Path, ocr: &dyn OcrEngine) -> Result<Vec<PageText>> {
    match DocumentKind::from_path(path) {
        DocumentKind::Pdf => LopdfExtractor.extract_pages(path),
        DocumentKind::Image => {
            let text = ocr.recognize(path)?;
            if text.trim().is_empty() {
                Ok(Vec::new())
            } else {
                Ok(vec![PageText { number: 1, text }])
            }
        }
        DocumentKind::Unsupported => {
            warn!(path = %path.display(), "unsupported file type, nothing extracted");
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedOcr(&'static str);

    impl OcrEngine for FixedOcr {
        fn recognize(&self, _path: &Path) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn kind_detection_is_case_insensitive() {
        assert_eq!(DocumentKind::from_path(Path::new("a.PDF")), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_path(Path::new("scan.JPeG")), DocumentKind::Image);
        assert_eq!(DocumentKind::from_path(Path::new("b.tiff")), DocumentKind::Image);
        assert_eq!(
            DocumentKind::from_path(Path::new("notes.docx")),
            DocumentKind::Unsupported
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("no_extension")),
            DocumentKind::Unsupported
        );
    }

    #[test]
    fn image_extraction_is_a_single_page_numbered_one() {
        let pages = extract_document(Path::new("scan.png"), &FixedOcr("Recognized body"))
            .expect("image extraction");
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].number, 1);
        assert_eq!(pages[0].text, "Recognized body");
    }

    #[test]
    fn empty_ocr_output_yields_empty_sequence() {
        let pages =
            extract_document(Path::new("scan.png"), &FixedOcr("  \n ")).expect("image extraction");
        assert!(pages.is_empty());
    }

    #[test]
    fn unsupported_extension_yields_empty_sequence() {
        let pages =
            extract_document(Path::new("notes.docx"), &DisabledOcr).expect("unsupported file");
        assert!(pages.is_empty());
    }

    #[test]
    fn unreadable_pdf_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4\n%broken").expect("write");

        let result = extract_document(&path, &DisabledOcr);
        assert!(matches!(result, Err(IngestError::PdfParse(_))));
    }

    #[test]
    fn disabled_ocr_surfaces_a_per_file_error() {
        let result = extract_document(Path::new("scan.png"), &DisabledOcr);
        assert!(matches!(result, Err(IngestError::OcrFailed(_))));
    }
}
