//! # PageIndex
//!
//! Page-level indexing and retrieval for PDF documents.
//!
//! A document is indexed once: every page's text is extracted (with a
//! vision-model fallback for scanned pages), summarized by a language
//! model, and the result is persisted keyed by the document's path and
//! validated by a hash of its bytes. Later calls reuse the stored index
//! until the file changes. Queries are answered by asking the model to
//! rank the page summaries.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐
//! │   PDF    │──▶│   Extract    │──▶│  Summarize   │
//! │ (lopdf)  │   │ (+ vision)   │   │    (LLM)     │
//! └──────────┘   └──────────────┘   └──────┬───────┘
//!                                          ▼
//!                                   ┌──────────────┐
//!                                   │  JSON store  │
//!                                   └──────┬───────┘
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                ┌───────────┐       ┌──────────┐
//!                │    CLI    │       │ MCP/HTTP │
//!                │(pageindex)│       │  tools   │
//!                └───────────┘       └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`models`] | Persisted records and response shapes |
//! | [`hashing`] | Content hashes and document keys |
//! | [`store`] | Index persistence |
//! | [`gate`] | Per-document build exclusion |
//! | [`pdf`] | Page text and rendering |
//! | [`llm`] | Completion and vision clients |
//! | [`extract`] | Page text with vision fallback |
//! | [`summarize`] | Per-page summaries |
//! | [`rank`] | Query ranking over summaries |
//! | [`indexer`] | Build orchestration, `get_index` and `get_detail` |
//! | [`progress`] | Build progress reporting |
//! | [`logging`] | Tracing setup |
//! | [`tools`] | Tool trait and registry |
//! | [`mcp`] | MCP stdio server |
//! | [`server`] | HTTP tool server |

pub mod config;
pub mod extract;
pub mod gate;
pub mod hashing;
pub mod indexer;
pub mod llm;
pub mod logging;
pub mod mcp;
pub mod models;
pub mod pdf;
pub mod progress;
pub mod rank;
pub mod server;
pub mod store;
pub mod summarize;
pub mod tools;
