//! ReAct loop
//!
//! Each THINKING step sends the trimmed context, the ReAct instructions (with
//! the tool catalog when tools are enabled) and the scratchpad of earlier
//! rounds, then parses the reply. The scratchpad lives only in the trace; it
//! is never written back to the conversation.

use tokio_util::sync::CancellationToken;

use super::parser::{ParsedOutput, parse_reasoning_output};
use super::trace::ReasoningTrace;
use super::{ReasoningEngine, ReasoningOutcome, ReasoningType, with_instructions};
use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::tool::{ToolInvocation, ToolResult};

const REACT_INSTRUCTIONS: &str = r#"Answer the user's latest message by reasoning step by step.

Use exactly this format when you need a tool:

Thought: what you need to find out and why
Action: the tool name
Action Input: a JSON object with the tool's parameters, e.g. {"query": "..."}

Then stop and wait for the Observation. When you know the answer, reply with:

Thought: why you are done
Final Answer: your complete answer to the user

Never write an Observation yourself."#;

const NO_TOOLS_NOTE: &str = "No tools are available for this conversation. Reason it through and give a Final Answer.";

const CONTINUE_PROMPT: &str =
    "Continue from the observation above. Reply with the next Thought and Action, or with a Final Answer.";

/// States of one ReAct run
#[derive(Debug)]
enum LoopState {
    Thinking,
    Acting {
        thought: String,
        invocation: ToolInvocation,
        input_error: Option<String>,
    },
    Observing {
        thought: String,
        invocation: ToolInvocation,
        result: ToolResult,
    },
    Done(String),
}

impl ReasoningEngine {
    /// Run the think/act/observe loop until a final answer or the iteration cap
    pub async fn react(
        &self,
        context: &[Message],
        use_tools: bool,
        cancel: &CancellationToken,
    ) -> Result<ReasoningOutcome> {
        let base = with_instructions(context, &self.react_instructions(use_tools));
        let max_iterations = self.config.max_iterations.max(1);

        let mut trace = ReasoningTrace::new(ReasoningType::React);
        let mut last_thought: Option<String> = None;
        let mut last_completion = String::new();
        let mut state = LoopState::Thinking;

        loop {
            state = match state {
                LoopState::Thinking if trace.iterations >= max_iterations => {
                    tracing::warn!(iterations = trace.iterations, "ReAct iteration cap reached");
                    trace.incomplete = true;
                    LoopState::Done(best_effort_answer(
                        &trace,
                        last_thought.as_deref(),
                        &last_completion,
                    ))
                }

                LoopState::Thinking => {
                    trace.iterations += 1;
                    let prompt = build_prompt(&base, &trace);

                    let completion = self
                        .router
                        .complete_cancellable(&prompt, &self.config.generation, cancel)
                        .await?;
                    last_completion.clone_from(&completion.content);

                    match parse_reasoning_output(&completion.content) {
                        ParsedOutput::FinalAnswer { thought, answer } => {
                            tracing::debug!(iteration = trace.iterations, "THINKING -> DONE");
                            trace.push_step(thought.unwrap_or_default(), None, None);
                            LoopState::Done(answer)
                        }
                        ParsedOutput::Action {
                            thought,
                            invocation,
                            input_error,
                        } => {
                            tracing::debug!(
                                iteration = trace.iterations,
                                tool = %invocation.name,
                                "THINKING -> ACTING"
                            );
                            last_thought.clone_from(&thought);
                            LoopState::Acting {
                                thought: thought.unwrap_or_default(),
                                invocation,
                                input_error,
                            }
                        }
                        ParsedOutput::Unparsed(text) => {
                            tracing::warn!(
                                iteration = trace.iterations,
                                "completion had no reasoning markers; using it as the answer"
                            );
                            trace.parse_fallback = true;
                            LoopState::Done(text)
                        }
                    }
                }

                LoopState::Acting {
                    thought,
                    invocation,
                    input_error,
                } => {
                    let result = if let Some(reason) = input_error {
                        let error = AgentError::InvalidToolArguments {
                            tool: invocation.name.clone(),
                            reason,
                        };
                        ToolResult::failure(&invocation.name, error.to_string())
                    } else if use_tools {
                        self.invoke_tool(&invocation, cancel).await?
                    } else {
                        ToolResult::failure(&invocation.name, "no tools are available in this conversation")
                    };

                    tracing::debug!(tool = %invocation.name, success = result.success, "ACTING -> OBSERVING");
                    LoopState::Observing {
                        thought,
                        invocation,
                        result,
                    }
                }

                LoopState::Observing {
                    thought,
                    invocation,
                    result,
                } => {
                    trace.push_step(thought, Some(invocation), Some(result));
                    LoopState::Thinking
                }

                LoopState::Done(answer) => {
                    trace.finish();
                    tracing::info!(
                        iterations = trace.iterations,
                        actions = trace.action_steps().count(),
                        incomplete = trace.incomplete,
                        parse_fallback = trace.parse_fallback,
                        "ReAct finished"
                    );

                    return Ok(ReasoningOutcome {
                        answer,
                        tool_results: trace.tool_results(),
                        trace: Some(trace),
                    });
                }
            };
        }
    }

    fn react_instructions(&self, use_tools: bool) -> String {
        if use_tools && !self.tools.is_empty() {
            format!("{REACT_INSTRUCTIONS}\n\n{}", self.tools.generate_prompt_section())
        } else {
            format!("{REACT_INSTRUCTIONS}\n\n{NO_TOOLS_NOTE}")
        }
    }
}

/// Base prompt plus the scratchpad of completed rounds
fn build_prompt(base: &[Message], trace: &ReasoningTrace) -> Vec<Message> {
    let mut prompt = base.to_vec();
    let scratchpad = trace.render_scratchpad();

    if !scratchpad.is_empty() {
        prompt.push(Message::assistant(scratchpad));
        prompt.push(Message::user(CONTINUE_PROMPT));
    }

    prompt
}

/// Answer used when the cap is hit before a final answer
fn best_effort_answer(trace: &ReasoningTrace, last_thought: Option<&str>, last_completion: &str) -> String {
    let body = trace
        .steps
        .iter()
        .rev()
        .filter_map(|s| s.observation.as_ref())
        .find(|o| o.success)
        .map(ToolResult::observation)
        .or_else(|| last_thought.map(str::to_string))
        .unwrap_or_else(|| last_completion.trim().to_string());

    format!(
        "Reasoning stopped after {} steps before reaching a final answer. Best available result:\n\n{body}",
        trace.iterations
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::reasoning::ReasoningConfig;
    use crate::router::ProviderRouter;
    use crate::testing::{RecordingSearchTool, ScriptedProvider};
    use crate::tool::{FnTool, ParameterSchema, ToolRegistry, ToolSchema};

    const SEARCH_X: &str = "Thought: I need to look this up\nAction: web_search\nAction Input: {\"query\": \"X\"}";

    fn engine(provider: Arc<ScriptedProvider>, tools: ToolRegistry, max_iterations: usize) -> ReasoningEngine {
        ReasoningEngine::new(
            Arc::new(ProviderRouter::single(provider)),
            Arc::new(tools),
            ReasoningConfig {
                max_iterations,
                ..ReasoningConfig::default()
            },
        )
    }

    fn search_registry() -> (ToolRegistry, Arc<RecordingSearchTool>) {
        let search = RecordingSearchTool::shared();
        let mut tools = ToolRegistry::new();
        tools.register_arc(search.clone()).unwrap();
        (tools, search)
    }

    #[tokio::test]
    async fn test_final_answer_in_one_iteration() {
        let provider = Arc::new(ScriptedProvider::new("scripted", vec!["Thought: simple\nFinal Answer: 4"]));
        let (tools, search) = search_registry();
        let engine = engine(provider.clone(), tools, 6);

        let outcome = engine
            .react(&[Message::user("2+2?")], true, &CancellationToken::new())
            .await
            .unwrap();

        let trace = outcome.trace.unwrap();
        assert_eq!(outcome.answer, "4");
        assert_eq!(trace.iterations, 1);
        assert_eq!(trace.action_steps().count(), 0);
        assert!(!trace.incomplete);
        assert_eq!(search.call_count(), 0);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_markerless_completion_is_fallback_answer() {
        let provider = Arc::new(ScriptedProvider::new("scripted", vec!["Just the answer, no format."]));
        let engine = engine(provider.clone(), ToolRegistry::new(), 6);

        let outcome = engine
            .react(&[Message::user("hi")], true, &CancellationToken::new())
            .await
            .unwrap();

        let trace = outcome.trace.unwrap();
        assert_eq!(outcome.answer, "Just the answer, no format.");
        assert!(trace.parse_fallback);
        assert_eq!(trace.iterations, 1);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_action_invokes_tool_and_loops() {
        let provider = Arc::new(ScriptedProvider::new(
            "scripted",
            vec![SEARCH_X, "Thought: got it\nFinal Answer: X is a letter"],
        ));
        let (tools, search) = search_registry();
        let engine = engine(provider.clone(), tools, 6);

        let outcome = engine
            .react(&[Message::user("what is X?")], true, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(search.call_count(), 1);
        assert_eq!(
            serde_json::Value::Object(search.calls.lock().unwrap()[0].clone()),
            json!({"query": "X"})
        );

        let trace = outcome.trace.unwrap();
        let step = &trace.steps[0];
        assert_eq!(step.index, 0);
        assert_eq!(step.action.as_ref().unwrap().name, "web_search");
        assert!(step.observation.as_ref().unwrap().success);
        assert_eq!(trace.iterations, 2);
        assert_eq!(outcome.answer, "X is a letter");
        assert_eq!(outcome.tool_results.len(), 1);

        // second call carries the scratchpad, first call does not
        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].iter().all(|m| !m.content.contains("Observation:")));
        assert!(requests[1].iter().any(|m| m.content.contains("Observation: Top result for 'X'")));
        assert!(requests[0][0].content.contains("### web_search"));
    }

    #[tokio::test]
    async fn test_iteration_cap_marks_incomplete() {
        let provider = Arc::new(ScriptedProvider::new("scripted", vec![SEARCH_X, SEARCH_X, SEARCH_X]));
        let (tools, search) = search_registry();
        let engine = engine(provider.clone(), tools, 2);

        let outcome = engine
            .react(&[Message::user("loop forever")], true, &CancellationToken::new())
            .await
            .unwrap();

        let trace = outcome.trace.unwrap();
        assert!(trace.incomplete);
        assert_eq!(trace.iterations, 2);
        assert_eq!(provider.call_count(), 2);
        assert_eq!(search.call_count(), 2);
        assert!(outcome.answer.starts_with("Reasoning stopped after 2 steps"));
        assert!(outcome.answer.contains("Top result for 'X'"));
    }

    #[tokio::test]
    async fn test_failed_tool_is_an_observation() {
        let provider = Arc::new(ScriptedProvider::new(
            "scripted",
            vec![
                "Action: web_search\nAction Input: {}",
                "Action: flaky\nAction Input: {}",
                "Action: missing_tool",
                "Final Answer: recovered",
            ],
        ));
        let (mut tools, search) = search_registry();
        tools
            .register(FnTool::new(ToolSchema::new("flaky", "Always breaks"), |_: &crate::tool::Arguments| {
                Err("backend down".to_string())
            }))
            .unwrap();
        let engine = engine(provider.clone(), tools, 6);

        let outcome = engine
            .react(&[Message::user("try")], true, &CancellationToken::new())
            .await
            .unwrap();

        let trace = outcome.trace.unwrap();
        assert_eq!(outcome.answer, "recovered");
        assert_eq!(trace.action_steps().count(), 3);
        assert!(trace.action_steps().all(|s| !s.observation.as_ref().unwrap().success));
        // missing required `query` never reaches the handler
        assert_eq!(search.call_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_action_input_skips_registry() {
        let provider = Arc::new(ScriptedProvider::new(
            "scripted",
            vec!["Action: web_search\nAction Input: query=X", "Final Answer: ok"],
        ));
        let (tools, search) = search_registry();
        let engine = engine(provider, tools, 6);

        let outcome = engine
            .react(&[Message::user("q")], true, &CancellationToken::new())
            .await
            .unwrap();

        let observation = outcome.trace.unwrap().steps[0].observation.clone().unwrap();
        assert!(observation.error.unwrap().contains("Invalid arguments for tool 'web_search'"));
        assert_eq!(search.call_count(), 0);
    }

    #[tokio::test]
    async fn test_tools_disabled_omits_catalog_and_refuses_actions() {
        let provider = Arc::new(ScriptedProvider::new("scripted", vec![SEARCH_X, "Final Answer: fine"]));
        let (tools, search) = search_registry();
        let engine = engine(provider.clone(), tools, 6);

        let outcome = engine
            .react(&[Message::user("q")], false, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.answer, "fine");
        assert_eq!(search.call_count(), 0);
        assert!(!provider.requests()[0][0].content.contains("### web_search"));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_call() {
        let provider = Arc::new(ScriptedProvider::new("scripted", vec!["Final Answer: never"]));
        let engine = engine(provider.clone(), ToolRegistry::new(), 6);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = engine.react(&[Message::user("q")], true, &cancel).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn test_catalog_lists_parameters() {
        let mut tools = ToolRegistry::new();
        tools
            .register(FnTool::new(
                ToolSchema::new("save_note", "Save a note").param(ParameterSchema::string("title", "Title").required()),
                |_: &crate::tool::Arguments| Ok(json!("saved")),
            ))
            .unwrap();
        let engine = engine(Arc::new(ScriptedProvider::new("s", vec![])), tools, 6);

        let instructions = engine.react_instructions(true);
        assert!(instructions.contains("- `title` (string, required): Title"));
        assert!(engine.react_instructions(false).contains("No tools are available"));
    }
}
