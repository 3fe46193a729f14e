//! Web Search Integration
//!
//! Abstractions and implementations for web search providers.

mod mock;
mod serpapi;

pub use mock::MockSearch;
pub use serpapi::SerpApiClient;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::SearchHit;

/// Search backend trait (Strategy pattern)
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Top `limit` organic results for `query`
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;

    /// Backend name
    fn name(&self) -> &str;
}
