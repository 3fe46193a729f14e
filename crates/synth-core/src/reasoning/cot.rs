//! Chain-of-thought: one provider call with a step-by-step instruction

use tokio_util::sync::CancellationToken;

use super::{ReasoningEngine, ReasoningOutcome, inject_tool_results, with_instructions};
use crate::error::Result;
use crate::message::{Message, Role};
use crate::tool::ToolResult;

const COT_SYSTEM_PROMPT: &str = "Use chain-of-thought reasoning to solve problems step-by-step.";

const STEP_BY_STEP_INSTRUCTION: &str =
    "Think through this step by step. Lay out each step of your reasoning before giving the answer.";

impl ReasoningEngine {
    /// Single augmented completion over the whole context.
    ///
    /// The latest user message gets the step-by-step instruction appended;
    /// the stored conversation is not touched. Pre-gathered tool results are
    /// injected as one extra message before that user message.
    pub async fn chain_of_thought(
        &self,
        context: &[Message],
        tool_results: &[ToolResult],
        cancel: &CancellationToken,
    ) -> Result<ReasoningOutcome> {
        let mut messages = with_instructions(context, COT_SYSTEM_PROMPT);

        if let Some(last_user) = messages.iter_mut().rev().find(|m| m.role == Role::User) {
            *last_user = Message::user(format!("{}\n\n{STEP_BY_STEP_INSTRUCTION}", last_user.content));
        }
        inject_tool_results(&mut messages, tool_results);

        tracing::debug!(messages = messages.len(), tools = tool_results.len(), "chain-of-thought call");

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
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::reasoning::ReasoningConfig;
    use crate::router::ProviderRouter;
    use crate::testing::ScriptedProvider;
    use crate::tool::ToolRegistry;

    #[tokio::test]
    async fn test_single_call_with_augmented_prompt() {
        let provider = Arc::new(ScriptedProvider::new("scripted", vec!["1. light 2. sugar"]));
        let engine = ReasoningEngine::new(
            Arc::new(ProviderRouter::single(provider.clone())),
            Arc::new(ToolRegistry::new()),
            ReasoningConfig::default(),
        );

        let context = vec![Message::user("Explain photosynthesis in two steps")];
        let outcome = engine
            .chain_of_thought(&context, &[], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.answer, "1. light 2. sugar");
        assert!(outcome.trace.is_none());
        assert_eq!(provider.call_count(), 1);

        let requests = provider.requests();
        let sent = &requests[0];
        assert_eq!(sent[0].role, Role::System);
        assert!(sent[0].content.contains("chain-of-thought"));
        assert!(sent[1].content.starts_with("Explain photosynthesis in two steps"));
        assert!(sent[1].content.contains("step by step"));
    }

    #[tokio::test]
    async fn test_tool_results_are_injected_before_the_question() {
        let provider = Arc::new(ScriptedProvider::new("scripted", vec!["answer"]));
        let engine = ReasoningEngine::new(
            Arc::new(ProviderRouter::single(provider.clone())),
            Arc::new(ToolRegistry::new()),
            ReasoningConfig::default(),
        );

        engine
            .chain_of_thought(
                &[Message::user("what's new?")],
                &[ToolResult::success("web_search", "news")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let requests = provider.requests();
        let sent = &requests[0];
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1].role, Role::Tool);
        assert_eq!(sent[2].role, Role::User);
    }
}
