//! Web Search Tool
//!
//! Searches the web through the configured `SearchBackend`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use synth_core::tool::{ParameterSchema, Tool, ToolInvocation, ToolOutput, ToolSchema};

use crate::search::SearchBackend;

/// Default number of results returned
pub const DEFAULT_NUM_RESULTS: usize = 3;

const MAX_NUM_RESULTS: usize = 10;

pub struct WebSearchTool {
    backend: Arc<dyn SearchBackend>,
}

impl WebSearchTool {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "web_search",
            "Search the web for current information. Returns title, snippet and link for the top results.",
        )
        .param(ParameterSchema::string("query", "What to search for").required())
        .param(
            ParameterSchema::integer("num_results", "How many results to return (1-10)")
                .default_value(json!(DEFAULT_NUM_RESULTS)),
        )
        .keywords(["search", "look up", "latest", "news", "current events"])
        .category("research")
    }

    async fn execute(&self, call: &ToolInvocation) -> synth_core::Result<ToolOutput> {
        let query = call.str_arg("query").unwrap_or_default().trim();
        let limit = call
            .arguments
            .get("num_results")
            .and_then(serde_json::Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_NUM_RESULTS)
            .clamp(1, MAX_NUM_RESULTS);

        let hits = self.backend.search(query, limit).await?;
        tracing::debug!(backend = self.backend.name(), %query, hits = hits.len(), "web search");

        Ok(ToolOutput::json(json!({
            "query": query,
            "results": hits,
        })))
    }
}
