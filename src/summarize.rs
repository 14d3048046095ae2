//! Per-page summaries.

use std::sync::Arc;

use crate::llm::{CompletionClient, CompletionError, CompletionRequest};
use crate::models::BLANK_PAGE_SUMMARY;

/// Page text beyond this many characters is dropped before summarizing.
pub const MAX_SUMMARY_INPUT_CHARS: usize = 3000;

/// Text and summary of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSummaryText {
    pub text: String,
    pub summary: String,
}

pub struct Summarizer {
    llm: Arc<dyn CompletionClient>,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }

    /// Summarizes one page. Blank pages never reach the model.
    ///
    /// `page_number` is 1-based and only used in the prompt. Errors from
    /// the completion service are returned as-is; there is no retry. An
    /// empty answer for a non-blank page is an error, never an empty summary.
    pub async fn summarize(
        &self,
        page_text: String,
        page_number: u32,
    ) -> Result<PageSummaryText, CompletionError> {
        if page_text.trim().is_empty() {
            return Ok(PageSummaryText {
                text: String::new(),
                summary: BLANK_PAGE_SUMMARY.to_string(),
            });
        }

        let prompt = summary_prompt(truncate_chars(&page_text, MAX_SUMMARY_INPUT_CHARS), page_number);
        let response = self.llm.complete(&CompletionRequest::text(prompt)).await?;
        let summary = response.trim();
        if summary.is_empty() {
            return Err(CompletionError::Malformed("empty summary".into()));
        }

        Ok(PageSummaryText {
            text: page_text,
            summary: summary.to_string(),
        })
    }
}

fn summary_prompt(text: &str, page_number: u32) -> String {
    format!(
        "Summarize the content of page {} below in 1-2 sentences.\n\n{}\n\n\
         Return only the summary text, with no prefix or explanation.",
        page_number, text
    )
}

/// First `max` characters of `text`, on a char boundary.
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
