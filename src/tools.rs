//! Tool trait and the built-in `get_index` / `get_detail` tools.
//!
//! Tools are the unit of dispatch for both transports: the MCP bridge
//! ([`crate::mcp`]) and the HTTP server ([`crate::server`]) look tools up in
//! a shared [`ToolRegistry`] and call [`Tool::execute`] with a [`ToolContext`].
//!
//! ```text
//! ┌──────────────────────────────┐
//! │         ToolRegistry         │
//! │  ┌───────────┐ ┌──────────┐  │
//! │  │ get_index │ │get_detail│  │
//! │  └───────────┘ └──────────┘  │
//! └──────────────┬───────────────┘
//!        ┌───────┴────────┐
//!        ▼                ▼
//!   McpBridge (stdio)   run_server (HTTP)
//! ```
//!
//! # Result contract
//!
//! Input errors (missing file, wrong extension, no index, page not found)
//! are *successful* tool results carrying an `error` field, so callers see
//! the same shape regardless of transport. Only internal failures (I/O,
//! unsaved index, completion service down during ranking) are returned
//! as `Err`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::indexer::{IndexError, PageIndexer, DEFAULT_TOP_K};
use crate::progress::{LogProgress, ProgressReporter};

/// A tool that agents can discover and call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Route path (`POST /tools/{name}`) and MCP tool name.
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// JSON Schema (`type: "object"`) describing the parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool. `params` is always a JSON object.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// What a tool needs at execution time.
#[derive(Clone)]
pub struct ToolContext {
    indexer: Arc<PageIndexer>,
    progress: Arc<dyn ProgressReporter>,
}

impl ToolContext {
    /// Context whose builds report progress as debug log events.
    pub fn new(indexer: Arc<PageIndexer>) -> Self {
        Self::with_progress(indexer, Arc::new(LogProgress))
    }

    pub fn with_progress(indexer: Arc<PageIndexer>, progress: Arc<dyn ProgressReporter>) -> Self {
        Self { indexer, progress }
    }
}

/// Maps an operation outcome onto the tool result contract.
fn into_tool_result<T: serde::Serialize>(outcome: Result<T, IndexError>) -> Result<Value> {
    match outcome {
        Ok(value) => Ok(serde_json::to_value(value)?),
        Err(IndexError::Internal(e)) => Err(e),
        Err(e) => e
            .to_error_body()
            .ok_or_else(|| anyhow::anyhow!("{}", e)),
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(tool: &str, params: Value) -> Result<T> {
    serde_json::from_value(params).with_context(|| format!("{}: invalid parameters", tool))
}

#[derive(Deserialize)]
struct GetIndexParams {
    file_path: String,
    #[serde(default)]
    query: Option<String>,
    #[serde(default = "default_top_k")]
    top_k: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

/// Builds (or reuses) the page index of a PDF and optionally ranks it.
pub struct GetIndexTool;

#[async_trait]
impl Tool for GetIndexTool {
    fn name(&self) -> &str {
        "get_index"
    }

    fn description(&self) -> &str {
        "Index a PDF page by page and return a summary of every page. \
         With a query, return the most relevant pages instead."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": { "type": "string", "description": "Path to the PDF file" },
                "query": { "type": "string", "description": "Optional search query" },
                "top_k": {
                    "type": "integer",
                    "description": "Maximum number of pages returned for a query",
                    "default": DEFAULT_TOP_K
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let params: GetIndexParams = parse_params(self.name(), params)?;
        let outcome = ctx
            .indexer
            .get_index(
                &params.file_path,
                params.query.as_deref(),
                params.top_k,
                ctx.progress.clone(),
            )
            .await;
        into_tool_result(outcome)
    }
}

#[derive(Debug, Deserialize)]
struct GetDetailParams {
    file_path: String,
    page: u32,
}

/// Returns the stored text and summary of one page.
pub struct GetDetailTool;

#[async_trait]
impl Tool for GetDetailTool {
    fn name(&self) -> &str {
        "get_detail"
    }

    fn description(&self) -> &str {
        "Return the full text and summary of one page of an indexed PDF. \
         Run get_index first."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": { "type": "string", "description": "Path to the PDF file" },
                "page": { "type": "integer", "description": "Page number, starting at 1" }
            },
            "required": ["file_path", "page"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let params: GetDetailParams = parse_params(self.name(), params)?;
        into_tool_result(ctx.indexer.get_detail(&params.file_path, params.page).await)
    }
}

/// Registry of tools served by both transports.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry with `get_index` and `get_detail`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(GetIndexTool));
        registry.register(Box::new(GetDetailTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_registered() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(registry.len(), 2);
        assert!(registry.find("get_index").is_some());
        assert!(registry.find("get_detail").is_some());
        assert!(registry.find("search").is_none());

        for tool in registry.tools() {
            let schema = tool.parameters_schema();
            assert_eq!(schema["type"], "object");
            assert!(schema["required"]
                .as_array()
                .unwrap()
                .contains(&json!("file_path")));
        }
    }

    #[test]
    fn index_params_defaults() {
        let p: GetIndexParams = parse_params("get_index", json!({ "file_path": "/a.pdf" })).unwrap();
        assert_eq!(p.top_k, DEFAULT_TOP_K);
        assert!(p.query.is_none());

        let err = parse_params::<GetDetailParams>("get_detail", json!({ "file_path": "/a.pdf" }))
            .unwrap_err();
        assert!(err.to_string().contains("invalid parameters"));
    }

    #[test]
    fn input_errors_become_error_bodies() {
        let value = into_tool_result::<Value>(Err(IndexError::NotPdf("a.txt".into()))).unwrap();
        assert!(value["error"].as_str().unwrap().contains("a.txt"));

        let err = into_tool_result::<Value>(Err(IndexError::Internal(anyhow::anyhow!("disk"))))
            .unwrap_err();
        assert_eq!(err.to_string(), "disk");
    }
}
