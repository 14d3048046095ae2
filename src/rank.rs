//! Query ranking over page summaries.
//!
//! One completion call sees every non-failed page summary as a numbered
//! list plus the query, and must answer with
//! `{"results": [{"page": N, "relevance": "..."}]}`. Anything that does not
//! parse into that shape yields an empty result: ranking is advisory.

use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::llm::{CompletionClient, CompletionError, CompletionRequest};
use crate::models::{PageRecord, RankedPage};

pub struct Ranker {
    llm: Arc<dyn CompletionClient>,
}

#[derive(Deserialize)]
struct RankingResponse {
    results: Vec<RankedPage>,
}

impl Ranker {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }

    /// Up to `top_k` pages most relevant to `query`, best first.
    pub async fn rank(
        &self,
        query: &str,
        pages: &[PageRecord],
        top_k: usize,
    ) -> Result<Vec<RankedPage>, CompletionError> {
        let candidates: Vec<&PageRecord> = pages.iter().filter(|p| !p.is_failed()).collect();
        if candidates.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let prompt = ranking_prompt(query, &candidates, top_k);
        let response = self.llm.complete(&CompletionRequest::text(prompt)).await?;

        let known: HashSet<u32> = candidates.iter().map(|p| p.page).collect();
        Ok(parse_ranking(&response, &known, top_k))
    }
}

fn ranking_prompt(query: &str, pages: &[&PageRecord], top_k: usize) -> String {
    let listing = pages
        .iter()
        .map(|p| format!("Page {}: {}", p.page, p.summary))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Find the pages most relevant to the user's query from the page summaries below.\n\n\
         Query: {query}\n\n\
         Page summaries:\n{listing}\n\n\
         Return at most {top_k} page numbers, ordered by relevance.\n\
         Respond with JSON of the form {{\"results\": [{{\"page\": <page number>, \"relevance\": \"<why it is relevant>\"}}]}}.\n\
         Return only the JSON, nothing else."
    )
}

/// Parses the model answer; unknown pages and duplicates are dropped.
fn parse_ranking(response: &str, known: &HashSet<u32>, top_k: usize) -> Vec<RankedPage> {
    let parsed: RankingResponse = match serde_json::from_str(strip_code_fence(response)) {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(error = %e, "unparseable ranking response");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    parsed
        .results
        .into_iter()
        .filter(|r| known.contains(&r.page) && seen.insert(r.page))
        .take(top_k)
        .collect()
}

fn strip_code_fence(s: &str) -> &str {
    let trimmed = s.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
