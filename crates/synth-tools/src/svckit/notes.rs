//! Research Note Tools
//!
//! `save_note` records a finding; `list_notes` reads them back.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use synth_core::tool::{ParamType, ParameterSchema, Tool, ToolInvocation, ToolOutput, ToolSchema};

use crate::error::ToolError;
use crate::model::Note;
use crate::store::NoteStore;

pub struct SaveNoteTool {
    store: Arc<dyn NoteStore>,
}

impl SaveNoteTool {
    pub fn new(store: Arc<dyn NoteStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SaveNoteTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new("save_note", "Save a research note with a title, content and optional tags.")
            .param(ParameterSchema::string("title", "Short title for the note").required())
            .param(ParameterSchema::string("content", "Body of the note").required())
            .param(ParameterSchema::array("tags", "Tags used to group notes").default_value(json!([])))
            .category("notes")
            .side_effects()
    }

    async fn execute(&self, call: &ToolInvocation) -> synth_core::Result<ToolOutput> {
        let title = call.str_arg("title").unwrap_or_default().trim();
        if title.is_empty() {
            return Err(ToolError::InvalidInput("note title must not be empty".into()).into());
        }

        let tags = call
            .arguments
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let note = self.store.save(Note::new(
            title,
            call.str_arg("content").unwrap_or_default(),
            tags,
        ))?;
        tracing::info!(note = %note.id, title = %note.title, "note saved");

        Ok(ToolOutput::json(serde_json::to_value(note)?))
    }
}

pub struct ListNotesTool {
    store: Arc<dyn NoteStore>,
}

impl ListNotesTool {
    pub fn new(store: Arc<dyn NoteStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ListNotesTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new("list_notes", "List saved research notes, optionally only those with a given tag.")
            .param(ParameterSchema::new("tag", ParamType::String, "Only return notes with this tag"))
            .category("notes")
    }

    async fn execute(&self, call: &ToolInvocation) -> synth_core::Result<ToolOutput> {
        let tag = call.str_arg("tag").map(str::trim).filter(|t| !t.is_empty());
        let notes = self.store.list(tag)?;
        Ok(ToolOutput::json(serde_json::to_value(notes)?))
    }
}
