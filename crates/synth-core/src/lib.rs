//! # synth-core
//!
//! Tool-augmented reasoning orchestrator with a provider-agnostic LLM
//! abstraction and an extensible tool system.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Orchestrator                            │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌────────────────────┐  │
//! │  │ Conversation │  │ Reasoning Engine │  │   ProviderRouter   │  │
//! │  │    Store     │──│ direct/CoT/ReAct │──│ (LlmProvider x N)  │  │
//! │  └──────────────┘  └────────┬─────────┘  └────────────────────┘  │
//! │                             │                                    │
//! │                      ┌──────┴───────┐                            │
//! │                      │ ToolRegistry │                            │
//! │                      └──────────────┘                            │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping between Groq, NGU, a local
//! OpenAI-compatible server or a test fake without changing reasoning logic.

pub mod error;
pub mod message;
pub mod orchestrator;
pub mod provider;
pub mod reasoning;
pub mod router;
pub mod session;
pub mod store;
pub mod tool;

#[cfg(test)]
mod testing;

pub use error::{AgentError, Result};
pub use message::{Message, Role};
pub use orchestrator::{ChatReply, Orchestrator, OrchestratorBuilder};
pub use provider::{Completion, GenerationOptions, LlmProvider};
pub use reasoning::{ReasoningStep, ReasoningTrace, ReasoningType};
pub use router::{ProviderRouter, RetryPolicy};
pub use session::{Session, SessionId, SessionStore, SessionSummary};
pub use store::ConversationStore;
pub use tool::{
    Arguments, FnTool, ParamType, ParameterSchema, Tool, ToolInvocation, ToolOutput, ToolRegistry, ToolResult,
    ToolSchema,
};
