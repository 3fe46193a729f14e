//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
///
/// Only `ProviderUnavailable`, `Cancelled` and configuration errors ever reach
/// the caller of the orchestrator. Tool errors are folded into failed
/// `ToolResult`s before the reasoning loop sees them.
#[derive(Error, Debug)]
pub enum AgentError {
    /// A single backend attempt failed (network error, non-2xx, bad payload)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Every configured profile was exhausted after retries and failover
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// A backend attempt exceeded its timeout
    #[error("Provider timed out after {0}s")]
    Timeout(u64),

    /// Tool not found in registry
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool arguments failed schema validation
    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidToolArguments { tool: String, reason: String },

    /// A tool with the same name is already registered
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    /// Tool handler failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// The enclosing request was cancelled
    #[error("Request cancelled")]
    Cancelled,

    /// Caller supplied unusable input (blank message, unknown strategy)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Session error
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Check if a backend attempt that failed with this error may be retried
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Provider(_) | Self::Timeout(_) | Self::Io(_)
        )
    }

    /// Stable machine-readable code for API responses
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Provider(_) => "PROVIDER_ERROR",
            Self::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            Self::Timeout(_) => "PROVIDER_TIMEOUT",
            Self::UnknownTool(_) => "UNKNOWN_TOOL",
            Self::InvalidToolArguments { .. } => "INVALID_TOOL_ARGUMENTS",
            Self::DuplicateTool(_) => "DUPLICATE_TOOL",
            Self::ToolExecution(_) => "TOOL_ERROR",
            Self::Cancelled => "REQUEST_CANCELLED",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Session(_) => "SESSION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            Self::ProviderUnavailable(_) | Self::Timeout(_) => {
                "The AI service is currently unavailable. Your message was saved; please try again.".into()
            }
            Self::UnknownTool(name) => format!("The tool '{name}' is not available."),
            Self::InvalidToolArguments { tool, reason } => {
                format!("Invalid input for tool '{tool}': {reason}")
            }
            Self::DuplicateTool(name) => format!("A tool named '{name}' is already registered."),
            Self::ToolExecution(msg) => format!("Tool error: {msg}"),
            Self::Cancelled => "The request was cancelled.".into(),
            Self::InvalidInput(msg) => msg.clone(),
            Self::Config(msg) => format!("The service is misconfigured: {msg}"),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
