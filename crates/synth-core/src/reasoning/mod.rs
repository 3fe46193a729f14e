//! Reasoning Engine
//!
//! Three ways to answer a turn, all sharing the provider router and the
//! tool registry:
//!
//! - **direct**: one bare completion
//! - **chain of thought**: one completion with a step-by-step instruction
//! - **ReAct**: a bounded think/act/observe loop (see [`react`])
//!
//! ```text
//!            ┌──────────┐  final answer   ┌──────┐
//!   start ──▶│ THINKING │────────────────▶│ DONE │
//!            └──────────┘                 └──────┘
//!               ▲    │ action                 ▲
//!   observation │    ▼                        │ iteration cap
//!            ┌───────────┐   ┌────────┐       │ (incomplete)
//!            │ OBSERVING │◀──│ ACTING │ ──────┘
//!            └───────────┘   └────────┘
//! ```

mod cot;
pub mod parser;
mod react;
pub mod trace;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::message::{Message, Role};
use crate::provider::GenerationOptions;
use crate::router::ProviderRouter;
use crate::tool::{ToolInvocation, ToolRegistry, ToolResult};

pub use parser::{ParsedOutput, parse_reasoning_output};
pub use trace::{ReasoningStep, ReasoningTrace};

/// Default ReAct iteration cap
pub const DEFAULT_MAX_ITERATIONS: usize = 6;

/// Default bound on a single tool invocation
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Reasoning strategy requested for a turn
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningType {
    #[default]
    None,
    ChainOfThought,
    React,
}

impl std::fmt::Display for ReasoningType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::ChainOfThought => write!(f, "chain_of_thought"),
            Self::React => write!(f, "react"),
        }
    }
}

impl FromStr for ReasoningType {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "" | "none" | "plain" => Ok(Self::None),
            "cot" | "chain_of_thought" => Ok(Self::ChainOfThought),
            "react" => Ok(Self::React),
            other => Err(AgentError::InvalidInput(format!(
                "unknown reasoning type '{other}' (expected none, chain_of_thought or react)"
            ))),
        }
    }
}

/// Reasoning engine configuration
#[derive(Clone, Debug)]
pub struct ReasoningConfig {
    /// Maximum ReAct iterations (provider calls) per turn
    pub max_iterations: usize,

    /// Timeout for one tool invocation; expiry becomes a failed result
    pub tool_timeout: Duration,

    /// Generation options passed to every provider call
    pub generation: GenerationOptions,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            generation: GenerationOptions::default(),
        }
    }
}

/// Answer plus whatever the strategy recorded along the way
#[derive(Clone, Debug)]
pub struct ReasoningOutcome {
    pub answer: String,
    pub trace: Option<ReasoningTrace>,
    pub tool_results: Vec<ToolResult>,
}

/// Drives the direct, chain-of-thought and ReAct strategies
pub struct ReasoningEngine {
    router: Arc<ProviderRouter>,
    tools: Arc<ToolRegistry>,
    config: ReasoningConfig,
}

impl ReasoningEngine {
    pub fn new(router: Arc<ProviderRouter>, tools: Arc<ToolRegistry>, config: ReasoningConfig) -> Self {
        Self {
            router,
            tools,
            config,
        }
    }

    pub const fn config(&self) -> &ReasoningConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// One bare completion over the context, with pre-gathered tool results
    pub async fn direct(
        &self,
        context: &[Message],
        tool_results: &[ToolResult],
        cancel: &CancellationToken,
    ) -> Result<ReasoningOutcome> {
        let mut messages = context.to_vec();
        inject_tool_results(&mut messages, tool_results);

        let completion = self
            .router
            .complete_cancellable(&messages, &self.config.generation, cancel)
            .await?;

        Ok(ReasoningOutcome {
            answer: completion.content,
            trace: None,
            tool_results: tool_results.to_vec(),
        })
    }

    /// Invoke every tool whose keywords match `user_text`
    pub async fn gather_tool_results(
        &self,
        user_text: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ToolResult>> {
        let mut results = Vec::new();

        for call in self.tools.match_intent(user_text) {
            tracing::debug!(tool = %call.name, "keyword pre-pass invoking tool");
            results.push(self.invoke_tool(&call, cancel).await?);
        }

        Ok(results)
    }

    /// Bound for one invocation of `name`. Model-backed tools get at least
    /// the router's full retry and failover budget.
    fn tool_timeout(&self, name: &str) -> Duration {
        match self.tools.schema(name) {
            Some(schema) if schema.calls_model => self.config.tool_timeout.max(self.router.request_budget()),
            _ => self.config.tool_timeout,
        }
    }

    /// Registry call bounded by the tool timeout and the request's cancellation
    async fn invoke_tool(&self, call: &ToolInvocation, cancel: &CancellationToken) -> Result<ToolResult> {
        let limit = self.tool_timeout(&call.name);
        let invocation = tokio::time::timeout(limit, self.tools.invoke(call));

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(AgentError::Cancelled),
            outcome = invocation => Ok(outcome.unwrap_or_else(|_| {
                tracing::warn!(tool = %call.name, "tool timed out");
                ToolResult::failure(
                    &call.name,
                    format!("tool timed out after {}s", limit.as_secs()),
                )
            })),
        }
    }
}

/// Merge `instructions` into the leading system message (or add one)
fn with_instructions(context: &[Message], instructions: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(context.len() + 1);

    match context.split_first() {
        Some((first, rest)) if first.is_system() => {
            messages.push(Message::system(format!("{}\n\n{instructions}", first.content)));
            messages.extend_from_slice(rest);
        }
        _ => {
            messages.push(Message::system(instructions));
            messages.extend_from_slice(context);
        }
    }

    messages
}

/// Insert tool output as one extra message just before the latest user message
fn inject_tool_results(messages: &mut Vec<Message>, tool_results: &[ToolResult]) {
    if tool_results.is_empty() {
        return;
    }

    let mut content = String::from("Tool results gathered for the user's latest message:\n");
    for result in tool_results {
        content.push_str(&format!("\n[{}]\n{}\n", result.name, result.observation()));
    }

    let at = messages
        .iter()
        .rposition(|m| m.role == Role::User)
        .unwrap_or(messages.len());
    messages.insert(at, Message::tool(content));
}
