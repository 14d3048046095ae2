//! Core data models used throughout pageindex.
//!
//! [`IndexRecord`] and [`PageRecord`] are the persisted shapes; the
//! remaining types are the response bodies of the `get_index` and
//! `get_detail` operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Summary stored for pages whose text is empty after trimming.
pub const BLANK_PAGE_SUMMARY: &str = "blank page";
/// Summary stored for pages whose extraction or summarization failed.
pub const FAILED_PAGE_SUMMARY: &str = "processing failed";

/// One page of an index. `page` is 1-based.
///
/// After a build exactly one of these holds: `summary` is a real summary,
/// `error` is set, or the page was blank (`summary == "blank page"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub page: u32,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageRecord {
    pub fn summarized(page: u32, text: String, summary: String) -> Self {
        Self {
            page,
            text,
            summary,
            error: None,
        }
    }

    pub fn blank(page: u32) -> Self {
        Self {
            page,
            text: String::new(),
            summary: BLANK_PAGE_SUMMARY.to_string(),
            error: None,
        }
    }

    pub fn failed(page: u32, error: impl Into<String>) -> Self {
        Self {
            page,
            text: String::new(),
            summary: FAILED_PAGE_SUMMARY.to_string(),
            error: Some(error.into()),
        }
    }

    /// True when the page carries a non-empty error.
    pub fn is_failed(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }
}

/// The persisted per-document index. Replaced wholesale on rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub file_path: String,
    #[serde(alias = "file_hash")]
    pub content_hash: String,
    pub total_pages: u32,
    pub indexed_at: DateTime<Utc>,
    pub pages: Vec<PageRecord>,
}

impl IndexRecord {
    pub fn page(&self, page: u32) -> Option<&PageRecord> {
        self.pages.iter().find(|p| p.page == page)
    }
}

/// Page entry of the `get_index` listing (text omitted).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSummary {
    pub page: u32,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One ranked search hit. `relevance` is the model's stated reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPage {
    pub page: u32,
    #[serde(deserialize_with = "string_or_number")]
    pub relevance: String,
}

/// `get_index` response without a query.
#[derive(Debug, Clone, Serialize)]
pub struct IndexListing {
    pub status: &'static str,
    pub file_path: String,
    pub total_pages: u32,
    pub indexed_at: DateTime<Utc>,
    pub pages: Vec<PageSummary>,
}

impl IndexListing {
    pub fn from_record(record: &IndexRecord) -> Self {
        Self {
            status: "success",
            file_path: record.file_path.clone(),
            total_pages: record.total_pages,
            indexed_at: record.indexed_at,
            pages: record
                .pages
                .iter()
                .map(|p| PageSummary {
                    page: p.page,
                    summary: p.summary.clone(),
                    error: p.error.clone(),
                })
                .collect(),
        }
    }
}

/// `get_index` response with a query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchListing {
    pub status: &'static str,
    pub file_path: String,
    pub query: String,
    pub total_pages: u32,
    pub results: Vec<RankedPage>,
}

/// Either shape returned by `get_index`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum IndexOutcome {
    Listing(IndexListing),
    Search(SearchListing),
}

/// `get_detail` response.
#[derive(Debug, Clone, Serialize)]
pub struct PageDetail {
    pub file_path: String,
    pub page: u32,
    pub text: String,
    pub summary: String,
    pub indexed_at: DateTime<Utc>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_file_hash_field_is_accepted() {
        let json = r#"{
            "file_path": "/tmp/a.pdf",
            "file_hash": "abc",
            "total_pages": 1,
            "indexed_at": "2026-01-02T03:04:05Z",
            "pages": [{"page": 1, "text": "", "summary": "blank page"}]
        }"#;
        let record: IndexRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.content_hash, "abc");
        assert_eq!(record.pages[0].error, None);
    }

    #[test]
    fn error_field_only_serialized_when_set() {
        let ok = serde_json::to_value(PageRecord::blank(1)).unwrap();
        assert!(ok.get("error").is_none());
        let failed = serde_json::to_value(PageRecord::failed(2, "boom")).unwrap();
        assert_eq!(failed["error"], "boom");
        assert_eq!(failed["summary"], FAILED_PAGE_SUMMARY);
    }

    #[test]
    fn relevance_accepts_numbers() {
        let hit: RankedPage = serde_json::from_str(r#"{"page": 3, "relevance": 0.9}"#).unwrap();
        assert_eq!(hit.relevance, "0.9");
    }
}
