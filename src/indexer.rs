//! Build orchestration and the two public operations.
//!
//! [`PageIndexer`] owns every collaborator and the per-document
//! [`BuildGate`]. It is created once at startup and shared behind an `Arc`.
//!
//! # Build sequence
//!
//! ```text
//! resolve path ─▶ acquire lease ─▶ hash bytes ─▶ load record
//!                                                  │
//!                    hash matches ◀────────────────┤
//!                    (return cached)               ▼
//!                                    for each page, in order:
//!                                      extract ─▶ summarize
//!                                      (failure ─▶ error page)
//!                                      report progress
//!                                                  │
//!                                    save record ─▶ release lease
//! ```
//!
//! One page's failure never aborts the build; a partially failed index is
//! saved and served from cache like any other. A failed save fails the
//! whole call because an unsaved index cannot be trusted as cached.
//!
//! Builds run on their own task, so a caller that stops waiting does not
//! cancel a build halfway: it finishes and persists regardless.

use anyhow::Context;
use chrono::Utc;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{expand_home, Config, ConfigSource};
use crate::extract::PageExtractor;
use crate::gate::BuildGate;
use crate::hashing::{derive_key, hash_content};
use crate::llm::{CompletionClient, Endpoint, OpenAiCompatClient};
use crate::models::{
    IndexListing, IndexOutcome, IndexRecord, PageDetail, PageRecord, SearchListing,
};
use crate::pdf::{DocumentOpener, LopdfOpener, PageSource};
use crate::progress::{BuildProgress, ProgressReporter};
use crate::rank::Ranker;
use crate::store::{FileIndexStore, IndexStore};
use crate::summarize::Summarizer;

/// Accepted document extension (case-insensitive).
pub const DOCUMENT_EXTENSION: &str = "pdf";
/// Number of ranked pages returned when the caller does not say.
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("not a PDF file: {0}")]
    NotPdf(String),
    #[error("no index found, run get_index('{0}') first")]
    NoIndex(String),
    #[error("page {page} not found")]
    PageNotFound { page: u32, total_pages: u32 },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IndexError {
    /// Structured `{error: ...}` body for input errors; `None` for internal failures.
    pub fn to_error_body(&self) -> Option<Value> {
        match self {
            IndexError::FileNotFound(_) | IndexError::NotPdf(_) | IndexError::NoIndex(_) => {
                Some(json!({ "error": self.to_string() }))
            }
            IndexError::PageNotFound { total_pages, .. } => Some(json!({
                "error": self.to_string(),
                "total_pages": total_pages,
            })),
            IndexError::Internal(_) => None,
        }
    }
}

pub struct PageIndexer {
    store: Arc<dyn IndexStore>,
    opener: Arc<dyn DocumentOpener>,
    gate: BuildGate,
    extractor: PageExtractor,
    summarizer: Summarizer,
    ranker: Ranker,
}

impl PageIndexer {
    pub fn new(
        store: Arc<dyn IndexStore>,
        opener: Arc<dyn DocumentOpener>,
        llm: Arc<dyn CompletionClient>,
        vision: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            store,
            opener,
            gate: BuildGate::new(),
            extractor: PageExtractor::new(vision),
            summarizer: Summarizer::new(llm.clone()),
            ranker: Ranker::new(llm),
        }
    }

    /// Production wiring: JSON files under `index.dir`, lopdf, and HTTP
    /// completion clients that re-read `source` on every call.
    pub fn from_config(config: &Config, source: ConfigSource) -> Self {
        Self::new(
            Arc::new(FileIndexStore::new(config.index.dir.clone())),
            Arc::new(LopdfOpener),
            Arc::new(OpenAiCompatClient::new(source.clone(), Endpoint::Llm)),
            Arc::new(OpenAiCompatClient::new(source, Endpoint::Ocr)),
        )
    }

    /// `get_index`: build (or reuse) the index, then optionally rank it.
    ///
    /// An empty `query` counts as no query.
    pub async fn get_index(
        self: &Arc<Self>,
        file_path: &str,
        query: Option<&str>,
        top_k: usize,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<IndexOutcome, IndexError> {
        let path = resolve_document_path(file_path).await?;
        let record = self.build_index(path, progress).await?;

        let Some(query) = query.filter(|q| !q.is_empty()) else {
            return Ok(IndexOutcome::Listing(IndexListing::from_record(&record)));
        };

        tracing::info!(file = %record.file_path, query, "searching index");
        let results = self
            .ranker
            .rank(query, &record.pages, top_k)
            .await
            .context("ranking failed")?;

        Ok(IndexOutcome::Search(SearchListing {
            status: "search",
            file_path: record.file_path,
            query: query.to_string(),
            total_pages: record.total_pages,
            results,
        }))
    }

    /// `get_detail`: one page from the stored index. Never builds.
    pub async fn get_detail(&self, file_path: &str, page: u32) -> Result<PageDetail, IndexError> {
        let path = absolute_path(file_path).await;
        let record = self
            .store
            .load(&derive_key(&path))
            .await?
            .ok_or_else(|| IndexError::NoIndex(file_path.to_string()))?;

        let entry = record.page(page).ok_or(IndexError::PageNotFound {
            page,
            total_pages: record.total_pages,
        })?;
        tracing::debug!(file = %path.display(), page, "page detail");

        Ok(PageDetail {
            file_path: path.display().to_string(),
            page,
            text: entry.text.clone(),
            summary: entry.summary.clone(),
            indexed_at: record.indexed_at,
        })
    }

    /// Returns a valid index for an already-resolved document path,
    /// building it if the cached one is missing or stale.
    pub async fn build_index(
        self: &Arc<Self>,
        path: PathBuf,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<IndexRecord, IndexError> {
        let this = Arc::clone(self);
        let task = tokio::spawn(async move { this.build_locked(&path, progress.as_ref()).await });
        let record = task.await.context("index build task failed")??;
        Ok(record)
    }

    async fn build_locked(
        &self,
        path: &Path,
        progress: &dyn ProgressReporter,
    ) -> anyhow::Result<IndexRecord> {
        let key = derive_key(path);
        let _lease = self.gate.acquire(&key).await;

        let bytes: Arc<[u8]> = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?
            .into();
        let content_hash = hash_content(&bytes);

        if let Some(cached) = self.store.load(&key).await? {
            if cached.content_hash == content_hash.as_str() {
                tracing::info!(file = %path.display(), "using cached index");
                return Ok(cached);
            }
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        tracing::info!(file = %name, "building index");

        let opener = Arc::clone(&self.opener);
        let doc = tokio::task::spawn_blocking(move || opener.open(bytes)).await??;
        let total_pages = u32::try_from(doc.page_count()).context("too many pages")?;

        let mut pages = Vec::with_capacity(total_pages as usize);
        for page_number in 1..=total_pages {
            progress.report(BuildProgress {
                document: name.clone(),
                completed: page_number - 1,
                total: total_pages,
            });
            let record = match self.process_page(doc.as_ref(), page_number).await {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(file = %name, page = page_number, error = %e, "page processing failed");
                    PageRecord::failed(page_number, nonempty_message(&e))
                }
            };
            pages.push(record);
        }
        progress.report(BuildProgress {
            document: name.clone(),
            completed: total_pages,
            total: total_pages,
        });

        let record = IndexRecord {
            file_path: path.display().to_string(),
            content_hash: content_hash.to_string(),
            total_pages,
            indexed_at: Utc::now(),
            pages,
        };
        self.store
            .save(&key, &record)
            .await
            .with_context(|| format!("Failed to save index for {}", path.display()))?;

        tracing::info!(file = %name, pages = total_pages, "index complete");
        Ok(record)
    }

    async fn process_page(
        &self,
        doc: &dyn PageSource,
        page_number: u32,
    ) -> anyhow::Result<PageRecord> {
        let text = self
            .extractor
            .extract_page(doc, (page_number - 1) as usize)
            .await?;
        let summarized = self.summarizer.summarize(text, page_number).await?;
        Ok(PageRecord::summarized(
            page_number,
            summarized.text,
            summarized.summary,
        ))
    }
}

fn nonempty_message(e: &anyhow::Error) -> String {
    let msg = e.to_string();
    if msg.trim().is_empty() {
        "unknown error".to_string()
    } else {
        msg
    }
}

/// Resolves a user-supplied path for indexing: `~` expanded, made absolute,
/// symlinks resolved. It must name a regular file with the `.pdf` extension.
pub async fn resolve_document_path(raw: &str) -> Result<PathBuf, IndexError> {
    let expanded = expand_home(Path::new(raw.trim()));
    let path = tokio::fs::canonicalize(&expanded)
        .await
        .map_err(|_| IndexError::FileNotFound(raw.to_string()))?;
    let is_file = tokio::fs::metadata(&path)
        .await
        .is_ok_and(|m| m.is_file());
    if !is_file {
        return Err(IndexError::FileNotFound(raw.to_string()));
    }

    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(DOCUMENT_EXTENSION));
    if !is_pdf {
        return Err(IndexError::NotPdf(raw.to_string()));
    }
    Ok(path)
}

/// Same resolution as [`resolve_document_path`] without requiring the file to exist.
async fn absolute_path(raw: &str) -> PathBuf {
    let expanded = expand_home(Path::new(raw.trim()));
    match tokio::fs::canonicalize(&expanded).await {
        Ok(path) => path,
        Err(_) => std::path::absolute(&expanded).unwrap_or(expanded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn resolve_rejects_missing_and_non_pdf() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope.pdf");
        assert!(matches!(
            resolve_document_path(missing.to_str().unwrap()).await,
            Err(IndexError::FileNotFound(_))
        ));

        let txt = tmp.path().join("notes.txt");
        std::fs::write(&txt, "x").unwrap();
        assert!(matches!(
            resolve_document_path(txt.to_str().unwrap()).await,
            Err(IndexError::NotPdf(_))
        ));

        let folder = tmp.path().join("folder.pdf");
        std::fs::create_dir(&folder).unwrap();
        assert!(matches!(
            resolve_document_path(folder.to_str().unwrap()).await,
            Err(IndexError::FileNotFound(_))
        ));

        let upper = tmp.path().join("SCAN.PDF");
        std::fs::write(&upper, "x").unwrap();
        let resolved = resolve_document_path(upper.to_str().unwrap()).await.unwrap();
        assert!(resolved.is_absolute());
    }

    #[test]
    fn error_bodies() {
        let body = IndexError::PageNotFound {
            page: 9,
            total_pages: 3,
        }
        .to_error_body()
        .unwrap();
        assert_eq!(body["total_pages"], 3);
        assert!(body["error"].as_str().unwrap().contains("not found"));

        let body = IndexError::NoIndex("/x.pdf".into()).to_error_body().unwrap();
        assert!(body["error"].as_str().unwrap().starts_with("no index found"));

        assert!(IndexError::Internal(anyhow::anyhow!("disk full"))
            .to_error_body()
            .is_none());
    }

    #[tokio::test]
    async fn absolute_path_of_missing_file_is_absolute() {
        assert!(absolute_path("relative/missing.pdf").await.is_absolute());
    }
}
