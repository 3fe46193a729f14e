//! SerpApi client
//!
//! `GET {base}/search.json?q=...&api_key=...` returning `organic_results`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::SearchBackend;
use crate::error::{Result, ToolError};
use crate::model::SearchHit;

pub const SERPAPI_BASE_URL: &str = "https://serpapi.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic_results: Vec<SearchHit>,
    #[serde(default)]
    error: Option<String>,
}

pub struct SerpApiClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl SerpApiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, SERPAPI_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl SearchBackend for SerpApiClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let limit_param = limit.to_string();
        let response = self
            .client
            .get(format!("{}/search.json", self.base_url))
            .query(&[
                ("q", query),
                ("api_key", self.api_key.as_str()),
                ("num", limit_param.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Search(format!("search API returned status {status}")));
        }

        let body: SearchResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(ToolError::Search(error));
        }

        tracing::debug!(%query, hits = body.organic_results.len(), "search completed");
        Ok(body.organic_results.into_iter().take(limit).collect())
    }

    fn name(&self) -> &str {
        "serpapi"
    }
}
