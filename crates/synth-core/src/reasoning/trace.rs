//! Reasoning traces
//!
//! A trace is scoped to one orchestrator call. It is returned to the caller
//! for display or export and is never written into the conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ReasoningType;
use crate::tool::{ToolInvocation, ToolResult};

/// One think/act/observe round
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub index: usize,
    pub thought: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ToolInvocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<ToolResult>,
}

/// Ordered record of a reasoning run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReasoningTrace {
    pub strategy: ReasoningType,
    pub steps: Vec<ReasoningStep>,

    /// Provider calls made by the loop
    pub iterations: usize,

    /// The iteration cap was hit before a final answer
    pub incomplete: bool,

    /// The final completion had no recognizable marker
    pub parse_fallback: bool,

    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ReasoningTrace {
    pub fn new(strategy: ReasoningType) -> Self {
        Self {
            strategy,
            steps: Vec::new(),
            iterations: 0,
            incomplete: false,
            parse_fallback: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Append a step, numbering it after the existing ones
    pub fn push_step(
        &mut self,
        thought: impl Into<String>,
        action: Option<ToolInvocation>,
        observation: Option<ToolResult>,
    ) {
        self.steps.push(ReasoningStep {
            index: self.steps.len(),
            thought: thought.into(),
            action,
            observation,
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Steps that invoked a tool
    pub fn action_steps(&self) -> impl Iterator<Item = &ReasoningStep> {
        self.steps.iter().filter(|s| s.action.is_some())
    }

    pub fn last_observation(&self) -> Option<&ToolResult> {
        self.steps.iter().rev().find_map(|s| s.observation.as_ref())
    }

    /// Tool results in step order
    pub fn tool_results(&self) -> Vec<ToolResult> {
        self.steps
            .iter()
            .filter_map(|s| s.observation.clone())
            .collect()
    }

    /// Scratchpad fed back to the model on the next THINKING step
    pub fn render_scratchpad(&self) -> String {
        let mut pad = String::new();
        for step in self.action_steps() {
            if !step.thought.is_empty() {
                pad.push_str(&format!("Thought: {}\n", step.thought));
            }
            if let Some(action) = &step.action {
                pad.push_str(&format!("Action: {}\n", action.name));
                pad.push_str(&format!("Action Input: {}\n", action.arguments_json()));
            }
            if let Some(observation) = &step.observation {
                pad.push_str(&format!("Observation: {}\n", observation.observation()));
            }
        }
        pad
    }

    /// Human-readable export
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# Reasoning trace ({})\n\n", self.strategy);

        for step in &self.steps {
            out.push_str(&format!("## Step {}\n\n", step.index + 1));
            if !step.thought.is_empty() {
                out.push_str(&format!("**Thought:** {}\n\n", step.thought));
            }
            if let Some(action) = &step.action {
                out.push_str(&format!(
                    "**Action:** `{}` with `{}`\n\n",
                    action.name,
                    action.arguments_json()
                ));
            }
            if let Some(observation) = &step.observation {
                let status = if observation.success { "Observation" } else { "Observation (failed)" };
                out.push_str(&format!("**{status}:**\n\n```\n{}\n```\n\n", observation.observation()));
            }
        }

        out.push_str(&format!("Iterations: {}\n", self.iterations));
        if self.incomplete {
            out.push_str("\n> Reasoning stopped at the iteration limit; the answer is a best effort.\n");
        }
        if self.parse_fallback {
            out.push_str("\n> The final reply did not follow the reasoning format and was used as-is.\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ReasoningTrace {
        let mut trace = ReasoningTrace::new(ReasoningType::React);
        trace.push_step(
            "need data",
            Some(ToolInvocation::from_json("web_search", json!({"query": "X"}))),
            Some(ToolResult::success("web_search", "X is a letter")),
        );
        trace.push_step("done", None, None);
        trace.iterations = 2;
        trace
    }

    #[test]
    fn test_steps_are_numbered_in_order() {
        let trace = sample();
        assert_eq!(trace.steps[0].index, 0);
        assert_eq!(trace.steps[1].index, 1);
        assert_eq!(trace.action_steps().count(), 1);
        assert_eq!(trace.last_observation().unwrap().observation(), "X is a letter");
    }

    #[test]
    fn test_scratchpad_renders_action_rounds_only() {
        let pad = sample().render_scratchpad();
        assert_eq!(
            pad,
            "Thought: need data\nAction: web_search\nAction Input: {\"query\":\"X\"}\nObservation: X is a letter\n"
        );
    }

    #[test]
    fn test_markdown_flags_incomplete() {
        let mut trace = sample();
        trace.incomplete = true;
        let md = trace.to_markdown();
        assert!(md.starts_with("# Reasoning trace (react)"));
        assert!(md.contains("## Step 2"));
        assert!(md.contains("iteration limit"));
    }
}
