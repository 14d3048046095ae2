//! Page text extraction with a vision fallback.
//!
//! Direct extraction comes first. When its trimmed result is shorter than
//! [`MIN_TEXT_CHARS`] and the vision endpoint is configured, the page is
//! rendered at [`RENDER_SCALE`]x, base64-encoded as PNG, and sent to the
//! vision model with [`OCR_PROMPT`]; the model's answer replaces the text.
//!
//! Vision failures are split:
//!
//! - transport failures (connection, rate limit, HTTP status) propagate as
//!   [`ExtractError::Completion`] and become a page-level error;
//! - anything else (render failure, malformed response, ...) is logged and
//!   the page text becomes the empty string.
//!
//! The second rule is lenient: an opaque vision failure looks exactly like
//! a blank page to the caller.

use base64::Engine;
use std::sync::Arc;

use crate::llm::{CompletionClient, CompletionError, CompletionRequest};
use crate::pdf::PageSource;

/// Trimmed direct-extraction text shorter than this triggers the vision fallback.
pub const MIN_TEXT_CHARS: usize = 10;
/// Render scale used for vision input.
pub const RENDER_SCALE: f32 = 2.0;
/// Instruction sent with the rendered page.
pub const OCR_PROMPT: &str = "Extract all text from this page image. Preserve the original \
layout and reading order as closely as possible. Output only the extracted text, with no \
commentary.";

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("page index {index} out of range [0, {total})")]
    PageOutOfRange { index: usize, total: usize },
    #[error("text extraction failed: {0}")]
    Text(String),
    #[error("vision extraction failed: {0}")]
    Completion(#[from] CompletionError),
}

pub struct PageExtractor {
    vision: Arc<dyn CompletionClient>,
}

impl PageExtractor {
    pub fn new(vision: Arc<dyn CompletionClient>) -> Self {
        Self { vision }
    }

    /// Text of page `index` (0-based).
    pub async fn extract_page(
        &self,
        doc: &dyn PageSource,
        index: usize,
    ) -> Result<String, ExtractError> {
        let total = doc.page_count();
        if index >= total {
            return Err(ExtractError::PageOutOfRange { index, total });
        }

        let text = doc
            .page_text(index)
            .map_err(|e| ExtractError::Text(e.to_string()))?;

        if text.trim().chars().count() >= MIN_TEXT_CHARS || !self.vision.is_configured().await {
            return Ok(text);
        }

        tracing::debug!(page = index + 1, "direct text too short, trying vision fallback");
        match self.ocr_page(doc, index).await {
            Ok(ocr_text) => Ok(ocr_text),
            Err(e) if e.is_transport() => Err(ExtractError::Completion(e)),
            Err(e) => {
                tracing::warn!(page = index + 1, error = %e, "vision fallback failed, using empty text");
                Ok(String::new())
            }
        }
    }

    async fn ocr_page(&self, doc: &dyn PageSource, index: usize) -> Result<String, CompletionError> {
        let png = doc
            .render_page(index, RENDER_SCALE)
            .map_err(|e| CompletionError::Other(format!("render failed: {}", e)))?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(png);
        let request = CompletionRequest::with_image(OCR_PROMPT, encoded);
        self.vision.complete(&request).await
    }
}
