//! Orchestrator
//!
//! Entry point for one user turn: locks the session, appends the user
//! message, picks a reasoning path and appends the final answer. The session
//! lock is held for the whole turn so turns on one session never interleave.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::GenerationOptions;
use crate::reasoning::{ReasoningConfig, ReasoningEngine, ReasoningOutcome, ReasoningTrace, ReasoningType};
use crate::router::ProviderRouter;
use crate::session::SessionId;
use crate::store::{ConversationStore, DEFAULT_MAX_CONTEXT_MESSAGES};
use crate::tool::{Tool, ToolRegistry, ToolResult};

/// Default system prompt sent ahead of every conversation
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are SynthesisTalk, a research assistant. \
Help the user explore topics, analyze documents and organize findings. \
Be accurate, cite tool results when you use them, and say so when you are unsure.";

/// Result of one handled turn
#[derive(Clone, Debug, Serialize)]
pub struct ChatReply {
    pub session_id: SessionId,
    pub answer: String,
    pub reasoning_type: ReasoningType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<ReasoningTrace>,
    pub tool_results: Vec<ToolResult>,
    /// ReAct hit its iteration cap; `answer` is a best effort
    pub incomplete: bool,
}

/// Answers user turns using the router, tools and conversation store
pub struct Orchestrator {
    engine: ReasoningEngine,
    router: Arc<ProviderRouter>,
    tools: Arc<ToolRegistry>,
    store: Arc<ConversationStore>,
    system_prompt: Option<String>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn router(&self) -> &ProviderRouter {
        &self.router
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Handle a turn that cannot be cancelled from outside
    pub async fn handle(
        &self,
        session_id: &SessionId,
        user_text: &str,
        use_tools: bool,
        reasoning_type: ReasoningType,
    ) -> Result<ChatReply> {
        self.handle_cancellable(session_id, user_text, use_tools, reasoning_type, &CancellationToken::new())
            .await
    }

    /// Handle a turn; firing `cancel` aborts the in-flight provider or tool
    /// call and any further reasoning iterations.
    ///
    /// On failure the user message stays in the history and no assistant
    /// message is appended.
    pub async fn handle_cancellable(
        &self,
        session_id: &SessionId,
        user_text: &str,
        use_tools: bool,
        reasoning_type: ReasoningType,
        cancel: &CancellationToken,
    ) -> Result<ChatReply> {
        if user_text.trim().is_empty() {
            return Err(AgentError::InvalidInput("message must not be empty".into()));
        }

        let mut session = self.store.lock(session_id).await?;
        session.append(Message::user(user_text))?;

        let context = self.model_context(session.context());
        tracing::debug!(
            session = %session_id,
            %reasoning_type,
            use_tools,
            context = context.len(),
            "handling turn"
        );

        let outcome = match self
            .reason(&context, user_text, use_tools, reasoning_type, cancel)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(session = %session_id, error = %e, "turn failed");
                return Err(e);
            }
        };

        session.append(Message::assistant(outcome.answer.clone()))?;

        let incomplete = outcome.trace.as_ref().is_some_and(|t| t.incomplete);
        tracing::info!(
            session = %session_id,
            %reasoning_type,
            tools_used = outcome.tool_results.len(),
            incomplete,
            "turn answered"
        );

        Ok(ChatReply {
            session_id: session_id.clone(),
            answer: outcome.answer,
            reasoning_type,
            trace: outcome.trace,
            tool_results: outcome.tool_results,
            incomplete,
        })
    }

    async fn reason(
        &self,
        context: &[Message],
        user_text: &str,
        use_tools: bool,
        reasoning_type: ReasoningType,
        cancel: &CancellationToken,
    ) -> Result<ReasoningOutcome> {
        if reasoning_type == ReasoningType::React {
            return self.engine.react(context, use_tools, cancel).await;
        }

        let tool_results = if use_tools {
            self.engine.gather_tool_results(user_text, cancel).await?
        } else {
            Vec::new()
        };

        match reasoning_type {
            ReasoningType::ChainOfThought => {
                self.engine
                    .chain_of_thought(context, &tool_results, cancel)
                    .await
            }
            _ => self.engine.direct(context, &tool_results, cancel).await,
        }
    }

    /// Prepend the system prompt unless the session already carries one
    fn model_context(&self, mut context: Vec<Message>) -> Vec<Message> {
        if let Some(prompt) = &self.system_prompt {
            if !context.first().is_some_and(Message::is_system) {
                context.insert(0, Message::system(prompt.clone()));
            }
        }
        context
    }
}

/// Builder for `Orchestrator`
pub struct OrchestratorBuilder {
    router: Option<Arc<ProviderRouter>>,
    tools: ToolRegistry,
    store: Option<Arc<ConversationStore>>,
    max_context_messages: usize,
    system_prompt: Option<String>,
    config: ReasoningConfig,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            router: None,
            tools: ToolRegistry::new(),
            store: None,
            max_context_messages: DEFAULT_MAX_CONTEXT_MESSAGES,
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.into()),
            config: ReasoningConfig::default(),
        }
    }

    #[must_use]
    pub fn router(mut self, router: Arc<ProviderRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// Register one tool; fails on a duplicate name
    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Result<Self> {
        self.tools.register(tool)?;
        Ok(self)
    }

    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Share an existing store instead of creating one
    #[must_use]
    pub fn store(mut self, store: Arc<ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub const fn max_context_messages(mut self, max: usize) -> Self {
        self.max_context_messages = max;
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn without_system_prompt(mut self) -> Self {
        self.system_prompt = None;
        self
    }

    #[must_use]
    pub const fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    #[must_use]
    pub fn generation(mut self, options: GenerationOptions) -> Self {
        self.config.generation = options;
        self
    }

    #[must_use]
    pub const fn tool_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.tool_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        let router = self
            .router
            .ok_or_else(|| AgentError::Config("a provider router is required".into()))?;
        let tools = Arc::new(self.tools);
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(ConversationStore::new(self.max_context_messages)));

        Ok(Orchestrator {
            engine: ReasoningEngine::new(router.clone(), tools.clone(), self.config),
            router,
            tools,
            store,
            system_prompt: self.system_prompt,
        })
    }
}
