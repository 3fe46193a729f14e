//! Error Types for the research tools

use synth_core::AgentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolError>;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Search error: {0}")]
    Search(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Model call failed: {0}")]
    Model(#[from] AgentError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Tool failures reach the registry as execution errors, which it folds
/// into failed `ToolResult`s
impl From<ToolError> for AgentError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Model(AgentError::Cancelled) => Self::Cancelled,
            other => Self::ToolExecution(other.to_string()),
        }
    }
}
