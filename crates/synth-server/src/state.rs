//! Application State

use std::sync::Arc;

use synth_core::Orchestrator;
use synth_tools::DocumentStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Orchestrator owning the router, tool registry and conversation store
    pub orchestrator: Arc<Orchestrator>,

    /// Uploaded document text, read by `analyze_document`
    pub documents: Arc<dyn DocumentStore>,
}
