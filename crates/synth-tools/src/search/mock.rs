//! Mock Search Backend
//!
//! Used when no search API key is configured. Results are deterministic and
//! say how to enable real search.

use async_trait::async_trait;

use super::SearchBackend;
use crate::error::Result;
use crate::model::SearchHit;

#[derive(Clone, Copy, Debug, Default)]
pub struct MockSearch;

#[async_trait]
impl SearchBackend for MockSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let hits = [
            SearchHit {
                title: format!("Mock Result 1 for '{query}'"),
                snippet: "This is a mock search result. Set SERPAPI_KEY for real search results.".into(),
                link: "https://example.com".into(),
            },
            SearchHit {
                title: format!("Mock Result 2 for '{query}'"),
                snippet: "Another mock result. Search works once the API key is configured.".into(),
                link: "https://example.com".into(),
            },
        ];
        Ok(hits.into_iter().take(limit).collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
