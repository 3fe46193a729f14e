//! # synth-tools
//!
//! Research tools for SynthesisTalk.
//!
//! ```text
//! ┌──────────────────┬──────────────────────────────┬──────────────────┐
//! │ tool             │ collaborator                 │ calls the model? │
//! ├──────────────────┼──────────────────────────────┼──────────────────┤
//! │ web_search       │ SearchBackend (SerpApi/mock) │ no               │
//! │ analyze_document │ DocumentStore                │ yes              │
//! │ save_note        │ NoteStore                    │ no               │
//! │ list_notes       │ NoteStore                    │ no               │
//! │ explain_concept  │ -                            │ yes              │
//! └──────────────────┴──────────────────────────────┴──────────────────┘
//! ```

pub mod error;
pub mod model;
pub mod search;
pub mod store;
pub mod svckit;

use std::sync::Arc;

pub use error::{Result, ToolError};
pub use model::{Document, DocumentInfo, Note, SearchHit};
pub use search::{MockSearch, SearchBackend, SerpApiClient};
pub use store::{DocumentStore, MemoryDocumentStore, MemoryNoteStore, NoteStore};
use synth_core::{ProviderRouter, ToolRegistry};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{AnalyzeDocumentTool, ExplainConceptTool, ListNotesTool, SaveNoteTool, WebSearchTool};
}

/// System prompt for the research assistant
pub const RESEARCH_ASSISTANT_PROMPT: &str = r"You are SynthesisTalk, a research assistant that helps users explore topics in depth.

## How to work

1. Break complex questions into smaller parts
2. Use `web_search` for current facts instead of guessing
3. Use `analyze_document` when the user refers to an uploaded document
4. Offer to `save_note` for findings worth keeping
5. Use `explain_concept` for clear explanations of unfamiliar terms

## Answers

- Cite which tool results you relied on
- Say plainly when information is uncertain or missing
- Prefer structured markdown: headings, short bullet points, bold key terms";

/// Collaborators shared by the research tools
#[derive(Clone)]
pub struct ResearchToolkit {
    pub search: Arc<dyn SearchBackend>,
    pub documents: Arc<dyn DocumentStore>,
    pub notes: Arc<dyn NoteStore>,
}

impl ResearchToolkit {
    /// In-memory stores with the given search backend
    pub fn in_memory(search: Arc<dyn SearchBackend>) -> Self {
        Self {
            search,
            documents: Arc::new(MemoryDocumentStore::new()),
            notes: Arc::new(MemoryNoteStore::new()),
        }
    }

    /// SerpApi when a key is set, mock results otherwise
    pub fn search_backend(serpapi_key: Option<&str>) -> Result<Arc<dyn SearchBackend>> {
        match serpapi_key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => Ok(Arc::new(SerpApiClient::new(key)?)),
            None => {
                tracing::warn!("SERPAPI_KEY not set; web_search returns mock results");
                Ok(Arc::new(MockSearch))
            }
        }
    }

    /// Register all five research tools
    pub fn register_all(&self, registry: &mut ToolRegistry, router: &Arc<ProviderRouter>) -> synth_core::Result<()> {
        registry.register(tools::WebSearchTool::new(self.search.clone()))?;
        registry.register(tools::AnalyzeDocumentTool::new(self.documents.clone(), router.clone()))?;
        registry.register(tools::SaveNoteTool::new(self.notes.clone()))?;
        registry.register(tools::ListNotesTool::new(self.notes.clone()))?;
        registry.register(tools::ExplainConceptTool::new(router.clone()))?;
        Ok(())
    }
}
