//! Document Analysis Tool
//!
//! Asks the model for a summary, a detailed report or a bullet summary of a
//! stored document. Only the first `ANALYSIS_CHAR_LIMIT` characters are sent.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use synth_core::tool::{ParameterSchema, Tool, ToolInvocation, ToolOutput, ToolSchema};
use synth_core::{GenerationOptions, Message, ProviderRouter};

use crate::error::ToolError;
use crate::store::DocumentStore;

/// Characters of document text included in the prompt
pub const ANALYSIS_CHAR_LIMIT: usize = 4000;

const SUMMARY_PROMPT: &str = "You are an expert at creating well-structured, readable summaries. \
Create summaries with clear organization and proper markdown formatting:

FORMATTING REQUIREMENTS:
- Use ## for main headings and ### for subheadings
- Create bullet points using - or * for key concepts
- Use **bold** for important terms and concepts
- Add line breaks between sections for readability
- Keep bullet points concise (1-2 lines each)
- Use numbered lists (1., 2., 3.) for sequential information

STRUCTURE:
1. Start with a brief overview
2. Organize content into logical sections with headings
3. Use bullet points for key concepts within each section
4. End with important takeaways or conclusions";

const DETAILED_PROMPT: &str = "You are a research analyst. Create a comprehensive, well-formatted analysis with these sections:

## Executive Summary
Brief overview with key points in bullet format

## Key Themes & Topics
- Main themes as bullet points

## Important Findings
- Critical discoveries or insights
- Supporting evidence

## Practical Applications
- Real-world uses

## Conclusions
- Final thoughts
- Recommendations

Use proper markdown formatting with headers, bullet points, bold text, and clear structure.";

const BULLETS_PROMPT: &str = "Create a summary that is primarily organized as bullet points:

## Document Summary

### Main Topics:
### Key Concepts:
- **Concept**: Brief explanation
### Important Details:
### Takeaways:

Focus on clarity and organization through bullet points.";

/// Kind of analysis requested
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalysisType {
    Summary,
    Detailed,
    Bullets,
}

impl AnalysisType {
    const fn system_prompt(self) -> &'static str {
        match self {
            Self::Summary => SUMMARY_PROMPT,
            Self::Detailed => DETAILED_PROMPT,
            Self::Bullets => BULLETS_PROMPT,
        }
    }

    const fn request(self) -> &'static str {
        match self {
            Self::Summary => "Please create a well-formatted, structured summary of the following document:",
            Self::Detailed => "Analyze this document and create a detailed, well-formatted report:",
            Self::Bullets => "Create a bullet-point summary of this document:",
        }
    }
}

impl FromStr for AnalysisType {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "summary" => Ok(Self::Summary),
            "detailed" => Ok(Self::Detailed),
            "bullets" | "bullet" => Ok(Self::Bullets),
            other => Err(ToolError::InvalidInput(format!(
                "unknown analysis_type '{other}' (expected summary, detailed or bullets)"
            ))),
        }
    }
}

pub struct AnalyzeDocumentTool {
    documents: Arc<dyn DocumentStore>,
    router: Arc<ProviderRouter>,
}

impl AnalyzeDocumentTool {
    pub fn new(documents: Arc<dyn DocumentStore>, router: Arc<ProviderRouter>) -> Self {
        Self { documents, router }
    }
}

#[async_trait]
impl Tool for AnalyzeDocumentTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "analyze_document",
            "Analyze an uploaded document. analysis_type is one of summary, detailed or bullets.",
        )
        .param(ParameterSchema::string("document_id", "Id of an uploaded document").required())
        .param(
            ParameterSchema::string("analysis_type", "summary, detailed or bullets")
                .default_value(json!("summary")),
        )
        .category("documents")
        .model_backed()
    }

    async fn execute(&self, call: &ToolInvocation) -> synth_core::Result<ToolOutput> {
        let id = call.str_arg("document_id").unwrap_or_default();
        let analysis: AnalysisType = call.str_arg("analysis_type").unwrap_or_default().parse()?;

        let document = self
            .documents
            .get(id)?
            .ok_or_else(|| ToolError::DocumentNotFound(id.to_string()))?;
        let excerpt: String = document.text.chars().take(ANALYSIS_CHAR_LIMIT).collect();

        let messages = [
            Message::system(analysis.system_prompt()),
            Message::user(format!("{}\n\n{excerpt}", analysis.request())),
        ];
        let completion = self
            .router
            .complete(&messages, &GenerationOptions::default())
            .await
            .map_err(ToolError::from)?;

        Ok(ToolOutput::text(completion.content))
    }
}
