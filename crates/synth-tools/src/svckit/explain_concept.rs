//! Concept Explanation Tool

use std::sync::Arc;

use async_trait::async_trait;
use synth_core::tool::{ParameterSchema, Tool, ToolInvocation, ToolOutput, ToolSchema};
use synth_core::{GenerationOptions, Message, ProviderRouter};

use crate::error::ToolError;

const EDUCATOR_PROMPT: &str = "You are an expert educator. Explain concepts clearly, \
starting from the intuition, then the details, with a short example.";

pub struct ExplainConceptTool {
    router: Arc<ProviderRouter>,
}

impl ExplainConceptTool {
    pub fn new(router: Arc<ProviderRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Tool for ExplainConceptTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new("explain_concept", "Get a clear, educational explanation of a concept.")
            .param(ParameterSchema::string("concept", "The concept to explain").required())
            .category("research")
            .model_backed()
    }

    async fn execute(&self, call: &ToolInvocation) -> synth_core::Result<ToolOutput> {
        let concept = call.str_arg("concept").unwrap_or_default().trim();
        if concept.is_empty() {
            return Err(ToolError::InvalidInput("concept must not be empty".into()).into());
        }

        let messages = [
            Message::system(EDUCATOR_PROMPT),
            Message::user(format!("Explain the concept: {concept}")),
        ];
        let completion = self
            .router
            .complete(&messages, &GenerationOptions::default())
            .await
            .map_err(ToolError::from)?;

        Ok(ToolOutput::text(completion.content))
    }
}
