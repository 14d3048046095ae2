//! Shared fakes for the integration tests.
//!
//! The fakes count every call so tests can assert how much work a
//! `get_index` actually did.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use pageindex::indexer::PageIndexer;
use pageindex::llm::{CompletionClient, CompletionError, CompletionRequest};
use pageindex::pdf::{DocumentOpener, PageSource};
use pageindex::progress::{BuildProgress, ProgressReporter};
use pageindex::store::{FileIndexStore, IndexStore};

/// Marker a page text can carry to make its summary call fail.
pub const FAIL_SUMMARY: &str = "FAIL_SUMMARY";
/// Marker a page text can carry to get a whitespace-only summary back.
pub const EMPTY_SUMMARY: &str = "EMPTY_SUMMARY";

// ============ Document ============

#[derive(Clone)]
pub enum FakePage {
    Text(&'static str),
    /// Direct text extraction fails with this message.
    Broken(&'static str),
}

pub struct FakeOpener {
    pages: Vec<FakePage>,
    pub opens: AtomicUsize,
}

impl FakeOpener {
    pub fn new(pages: Vec<FakePage>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            opens: AtomicUsize::new(0),
        })
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl DocumentOpener for FakeOpener {
    fn open(&self, _bytes: Arc<[u8]>) -> Result<Box<dyn PageSource>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeDocument {
            pages: self.pages.clone(),
        }))
    }
}

struct FakeDocument {
    pages: Vec<FakePage>,
}

impl PageSource for FakeDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, index: usize) -> Result<String> {
        match &self.pages[index] {
            FakePage::Text(t) => Ok(t.to_string()),
            FakePage::Broken(msg) => Err(anyhow!("{}", msg)),
        }
    }

    fn render_page(&self, _index: usize, _scale: f32) -> Result<Vec<u8>> {
        Ok(b"\x89PNG fake".to_vec())
    }
}

// ============ Completion ============

/// Text model: summarizes as "summary of page N", answers ranking prompts
/// with `ranking_reply`.
pub struct FakeLlm {
    ranking_reply: Mutex<String>,
    delay: Option<Duration>,
    pub summary_calls: AtomicUsize,
    pub ranking_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeLlm {
    pub fn new() -> Arc<Self> {
        Self::build(None)
    }

    /// Every call sleeps for `delay` first.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Self::build(Some(delay))
    }

    fn build(delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            ranking_reply: Mutex::new(r#"{"results": []}"#.to_string()),
            delay,
            summary_calls: AtomicUsize::new(0),
            ranking_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn set_ranking_reply(&self, reply: &str) {
        *self.ranking_reply.lock().unwrap() = reply.to_string();
    }

    pub fn summary_calls(&self) -> usize {
        self.summary_calls.load(Ordering::SeqCst)
    }

    pub fn ranking_calls(&self) -> usize {
        self.ranking_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for FakeLlm {
    async fn is_configured(&self) -> bool {
        true
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let prompt = &request.prompt;
        if prompt.contains("Query:") {
            self.ranking_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(self.ranking_reply.lock().unwrap().clone());
        }

        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        if prompt.contains(FAIL_SUMMARY) {
            return Err(CompletionError::Status {
                status: 500,
                body: "upstream exploded".into(),
            });
        }
        if prompt.contains(EMPTY_SUMMARY) {
            return Ok("   \n".to_string());
        }
        let page = prompt
            .split("page ")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap_or("?");
        Ok(format!("summary of page {}", page))
    }
}

/// Vision model with a fixed reply.
pub struct FakeVision {
    configured: bool,
    reply: Result<String, CompletionError>,
    pub calls: AtomicUsize,
}

impl FakeVision {
    pub fn new(configured: bool, reply: Result<String, CompletionError>) -> Arc<Self> {
        Arc::new(Self {
            configured,
            reply,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn unconfigured() -> Arc<Self> {
        Self::new(false, Ok(String::new()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for FakeVision {
    async fn is_configured(&self) -> bool {
        self.configured
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(request.image_png_base64.is_some());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(CompletionError::RateLimited(m)) => Err(CompletionError::RateLimited(m.clone())),
            Err(CompletionError::Connection(m)) => Err(CompletionError::Connection(m.clone())),
            Err(e) => Err(CompletionError::Other(e.to_string())),
        }
    }
}

// ============ Progress ============

#[derive(Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<BuildProgress>>,
}

impl RecordingProgress {
    pub fn completed(&self) -> Vec<u32> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.completed)
            .collect()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: BuildProgress) {
        self.events.lock().unwrap().push(event);
    }
}

// ============ Harness ============

pub struct Harness {
    pub tmp: TempDir,
    pub indexer: Arc<PageIndexer>,
    pub store: Arc<FileIndexStore>,
    pub opener: Arc<FakeOpener>,
    pub llm: Arc<FakeLlm>,
    pub vision: Arc<FakeVision>,
}

impl Harness {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self::with(pages, FakeLlm::new(), FakeVision::unconfigured())
    }

    pub fn with(pages: Vec<FakePage>, llm: Arc<FakeLlm>, vision: Arc<FakeVision>) -> Self {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FileIndexStore::new(tmp.path().join("index")));
        let opener = FakeOpener::new(pages);
        let store_dyn: Arc<dyn IndexStore> = store.clone();
        let indexer = Arc::new(PageIndexer::new(
            store_dyn,
            opener.clone(),
            llm.clone(),
            vision.clone(),
        ));
        Self {
            tmp,
            indexer,
            store,
            opener,
            llm,
            vision,
        }
    }

    /// Writes a document file under the temp dir and returns its path as a string.
    pub fn write_doc(&self, name: &str, content: &[u8]) -> String {
        let path = self.tmp.path().join(name);
        std::fs::write(&path, content).unwrap();
        path_string(&path)
    }
}

pub fn path_string(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

pub fn canonical(path: &str) -> PathBuf {
    std::fs::canonicalize(path).unwrap()
}

/// Minimal multi-page PDF, one line of Helvetica text per page, with
/// correct xref offsets.
pub fn minimal_pdf(pages: &[&str]) -> Vec<u8> {
    let n = pages.len();
    let mut objects: Vec<String> = Vec::new();
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        n
    ));
    objects.push(
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    );
    for (i, text) in pages.iter().enumerate() {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >>",
            5 + 2 * i
        ));
        let stream = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for off in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}
