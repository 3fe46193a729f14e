//! Tool System
//!
//! Extensible tool framework for agent capabilities.
//! Tools are registered at startup and invoked by the reasoning engine.
//! `ToolRegistry::invoke` never fails: unknown tools, invalid arguments,
//! handler errors and handler panics all come back as a failed `ToolResult`
//! so the reasoning loop always has a well-formed observation.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};

/// Tool arguments as a JSON object
pub type Arguments = serde_json::Map<String, Value>;

/// Tool call request, usually parsed from model output
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Tool identifier
    #[serde(rename = "tool")]
    pub name: String,

    /// Arguments as key-value pairs
    #[serde(default)]
    pub arguments: Arguments,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Build from a `json!({...})` literal; non-objects become empty arguments
    pub fn from_json(name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Arguments::new(),
        };
        Self::new(name, arguments)
    }

    /// String argument by key
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }

    /// Compact JSON rendering of the arguments (used in scratchpads)
    pub fn arguments_json(&self) -> String {
        Value::Object(self.arguments.clone()).to_string()
    }
}

/// Successful handler output
#[derive(Clone, Debug, PartialEq)]
pub struct ToolOutput {
    pub data: Value,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            data: Value::String(text.into()),
        }
    }

    pub const fn json(data: Value) -> Self {
        Self { data }
    }
}

/// Normalized result of a tool invocation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Whether execution succeeded
    pub success: bool,

    /// Text or structured payload (`null` on failure)
    #[serde(default)]
    pub data: Value,

    /// Failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, data: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            success: true,
            data: data.into(),
            error: None,
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: false,
            data: Value::Null,
            error: Some(error.into()),
        }
    }

    /// Text shown to the model as the observation for this result
    pub fn observation(&self) -> String {
        if !self.success {
            return format!(
                "Error: {}",
                self.error.as_deref().unwrap_or("tool failed without a message")
            );
        }

        match &self.data {
            Value::String(text) => text.clone(),
            Value::Null => "(no output)".into(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        }
    }
}

/// JSON type of a declared parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        };
        f.write_str(name)
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON type
    #[serde(rename = "type")]
    pub param_type: ParamType,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterSchema {
    pub fn new(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: false,
            default: None,
        }
    }

    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParamType::String, description)
    }

    pub fn integer(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParamType::Integer, description)
    }

    pub fn array(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParamType::Array, description)
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Tool definition schema (shown to the model, used for validation)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,

    /// Phrases in a user message that suggest this tool
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    /// Category for grouping
    #[serde(default)]
    pub category: Option<String>,

    /// Whether tool has side effects
    #[serde(default)]
    pub has_side_effects: bool,

    /// Whether the tool completes through the provider router
    #[serde(default)]
    pub calls_model: bool,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            keywords: Vec::new(),
            category: None,
            has_side_effects: false,
            calls_model: false,
        }
    }

    #[must_use]
    pub fn param(mut self, param: ParameterSchema) -> Self {
        self.parameters.push(param);
        self
    }

    #[must_use]
    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub const fn side_effects(mut self) -> Self {
        self.has_side_effects = true;
        self
    }

    /// Mark the tool as calling the model, so it is bounded by the
    /// router's retry budget instead of the plain tool timeout
    #[must_use]
    pub const fn model_backed(mut self) -> Self {
        self.calls_model = true;
        self
    }

    /// Check `arguments` against the declared parameters.
    ///
    /// Returns the arguments with defaults filled in, or the reason the
    /// call is invalid. Undeclared arguments are passed through untouched.
    pub fn validate(&self, arguments: &Arguments) -> std::result::Result<Arguments, String> {
        let mut prepared = arguments.clone();

        for param in &self.parameters {
            match arguments.get(&param.name) {
                None | Some(Value::Null) => {
                    if param.required {
                        return Err(format!("missing required parameter '{}'", param.name));
                    }
                    if let Some(default) = &param.default {
                        prepared.insert(param.name.clone(), default.clone());
                    }
                }
                Some(value) if !param.param_type.matches(value) => {
                    return Err(format!(
                        "parameter '{}' must be of type {}, got {}",
                        param.name,
                        param.param_type,
                        json_type_name(value)
                    ));
                }
                Some(_) => {}
            }
        }

        Ok(prepared)
    }

    /// The single required string parameter, if the schema has exactly one
    fn primary_text_param(&self) -> Option<&str> {
        let mut required = self.parameters.iter().filter(|p| p.required);
        match (required.next(), required.next()) {
            (Some(param), None) if param.param_type == ParamType::String => Some(&param.name),
            _ => None,
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with already-validated arguments
    async fn execute(&self, call: &ToolInvocation) -> Result<ToolOutput>;
}

/// Adapts a plain closure into a `Tool`
pub struct FnTool<F> {
    schema: ToolSchema,
    handler: F,
}

impl<F> FnTool<F>
where
    F: Fn(&Arguments) -> std::result::Result<Value, String> + Send + Sync,
{
    pub fn new(schema: ToolSchema, handler: F) -> Self {
        Self { schema, handler }
    }
}

#[async_trait]
impl<F> Tool for FnTool<F>
where
    F: Fn(&Arguments) -> std::result::Result<Value, String> + Send + Sync,
{
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(&self, call: &ToolInvocation) -> Result<ToolOutput> {
        (self.handler)(&call.arguments)
            .map(ToolOutput::json)
            .map_err(AgentError::ToolExecution)
    }
}

struct RegisteredTool {
    schema: ToolSchema,
    tool: Arc<dyn Tool>,
}

/// Registry for available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_arc(Arc::new(tool))
    }

    /// Register a shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let schema = tool.schema();
        if self.tools.contains_key(&schema.name) {
            return Err(AgentError::DuplicateTool(schema.name));
        }

        tracing::debug!(tool = %schema.name, "registered tool");
        self.tools
            .insert(schema.name.clone(), RegisteredTool { schema, tool });
        Ok(())
    }

    /// Remove a tool; returns whether it was registered
    pub fn unregister(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|entry| entry.tool.clone())
    }

    pub fn schema(&self, name: &str) -> Option<&ToolSchema> {
        self.tools.get(name).map(|t| &t.schema)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get tool names (sorted)
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// All tool schemas, sorted by name
    pub fn list(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|entry| entry.schema.clone()).collect()
    }

    /// Invoke a tool by name
    pub async fn invoke_named(&self, name: &str, arguments: Arguments) -> ToolResult {
        self.invoke(&ToolInvocation::new(name, arguments)).await
    }

    /// Validate and execute a tool call; never fails
    pub async fn invoke(&self, call: &ToolInvocation) -> ToolResult {
        let Some(entry) = self.tools.get(&call.name) else {
            tracing::warn!(tool = %call.name, "unknown tool requested");
            let err = AgentError::UnknownTool(call.name.clone());
            return ToolResult::failure(
                &call.name,
                format!("{err}. Available tools: {}", self.names().join(", ")),
            );
        };

        let arguments = match entry.schema.validate(&call.arguments) {
            Ok(arguments) => arguments,
            Err(reason) => {
                tracing::warn!(tool = %call.name, %reason, "rejected tool arguments");
                let err = AgentError::InvalidToolArguments {
                    tool: call.name.clone(),
                    reason,
                };
                return ToolResult::failure(&call.name, err.to_string());
            }
        };

        let prepared = ToolInvocation::new(call.name.clone(), arguments);
        tracing::debug!(tool = %call.name, args = %prepared.arguments_json(), "executing tool");

        match AssertUnwindSafe(entry.tool.execute(&prepared))
            .catch_unwind()
            .await
        {
            Ok(Ok(output)) => ToolResult::success(&call.name, output.data),
            Ok(Err(e)) => {
                tracing::warn!(tool = %call.name, error = %e, "tool failed");
                ToolResult::failure(&call.name, e.to_string())
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".into());
                tracing::error!(tool = %call.name, %reason, "tool panicked");
                ToolResult::failure(&call.name, format!("tool '{}' crashed: {reason}", call.name))
            }
        }
    }

    /// Tools whose keywords appear in `text`, invoked with the text as their
    /// single required string argument
    pub fn match_intent(&self, text: &str) -> Vec<ToolInvocation> {
        let lowered = text.to_lowercase();

        self.tools
            .values()
            .filter(|entry| {
                entry
                    .schema
                    .keywords
                    .iter()
                    .any(|k| contains_phrase(&lowered, &k.to_lowercase()))
            })
            .filter_map(|entry| {
                let param = entry.schema.primary_text_param()?;
                let mut arguments = Arguments::new();
                arguments.insert(param.to_string(), Value::String(text.to_string()));
                Some(ToolInvocation::new(entry.schema.name.clone(), arguments))
            })
            .collect()
    }

    /// Generate the prompt section describing available tools
    pub fn generate_prompt_section(&self) -> String {
        let mut prompt = String::from("## Available Tools\n\n");

        for entry in self.tools.values() {
            let schema = &entry.schema;
            prompt.push_str(&format!("### {}\n{}\n", schema.name, schema.description));

            if !schema.parameters.is_empty() {
                prompt.push_str("Parameters:\n");
                for param in &schema.parameters {
                    let required = if param.required { ", required" } else { "" };
                    prompt.push_str(&format!(
                        "- `{}` ({}{}): {}\n",
                        param.name, param.param_type, required, param.description
                    ));
                }
            }
            prompt.push('\n');
        }

        prompt
    }
}

/// Whole-word phrase match on already-lowercased text
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }

    haystack.match_indices(phrase).any(|(start, _)| {
        let end = start + phrase.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSearchTool;
    use serde_json::json;

    fn echo_tool() -> FnTool<impl Fn(&Arguments) -> std::result::Result<Value, String> + Send + Sync> {
        let schema = ToolSchema::new("echo", "Echo the text back")
            .param(ParameterSchema::string("text", "Text to echo").required())
            .param(ParameterSchema::integer("times", "Repeat count").default_value(json!(1)));

        FnTool::new(schema, |args: &Arguments| {
            let text = args.get("text").and_then(Value::as_str).unwrap_or_default();
            let times = args.get("times").and_then(Value::as_u64).unwrap_or(1);
            Ok(json!(text.repeat(usize::try_from(times).unwrap_or(1))))
        })
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register_arc(RecordingSearchTool::shared()).unwrap();

        let err = registry.register_arc(RecordingSearchTool::shared()).unwrap_err();
        assert!(matches!(err, AgentError::DuplicateTool(name) if name == "web_search"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool()).unwrap();
        assert!(registry.unregister("echo"));
        assert!(!registry.unregister("echo"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_failed_result() {
        let registry = ToolRegistry::new();
        let result = registry.invoke_named("nope", Arguments::new()).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("Unknown tool: nope"));
    }

    #[tokio::test]
    async fn test_missing_required_parameter_skips_handler() {
        let search = RecordingSearchTool::shared();
        let mut registry = ToolRegistry::new();
        registry.register_arc(search.clone()).unwrap();

        let result = registry.invoke_named("web_search", Arguments::new()).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("missing required parameter 'query'"));
        assert_eq!(search.call_count(), 0);
    }

    #[tokio::test]
    async fn test_type_mismatch_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool()).unwrap();

        let call = ToolInvocation::from_json("echo", json!({"text": "a", "times": "two"}));
        let result = registry.invoke(&call).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("must be of type integer"));
    }

    #[tokio::test]
    async fn test_defaults_are_filled_before_handler() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool()).unwrap();

        let result = registry
            .invoke(&ToolInvocation::from_json("echo", json!({"text": "ab"})))
            .await;
        assert!(result.success);
        assert_eq!(result.data, json!("ab"));

        let result = registry
            .invoke(&ToolInvocation::from_json("echo", json!({"text": "ab", "times": 2})))
            .await;
        assert_eq!(result.observation(), "abab");
    }

    #[tokio::test]
    async fn test_handler_error_is_captured() {
        let mut registry = ToolRegistry::new();
        registry
            .register(FnTool::new(ToolSchema::new("broken", "Always fails"), |_: &Arguments| {
                Err("backend offline".to_string())
            }))
            .unwrap();

        let result = registry.invoke_named("broken", Arguments::new()).await;
        assert!(!result.success);
        assert_eq!(result.observation(), "Error: Tool execution error: backend offline");
    }

    #[tokio::test]
    async fn test_handler_panic_is_captured() {
        let mut registry = ToolRegistry::new();
        registry
            .register(FnTool::new(ToolSchema::new("panicky", "Panics"), |_: &Arguments| {
                panic!("boom")
            }))
            .unwrap();

        let result = registry.invoke_named("panicky", Arguments::new()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("boom"));
    }

    #[test]
    fn test_list_is_sorted_and_prompt_mentions_params() {
        let mut registry = ToolRegistry::new();
        registry.register_arc(RecordingSearchTool::shared()).unwrap();
        registry.register(echo_tool()).unwrap();

        let names: Vec<_> = registry.list().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["echo", "web_search"]);

        let prompt = registry.generate_prompt_section();
        assert!(prompt.contains("### web_search"));
        assert!(prompt.contains("`query` (string, required)"));
        assert!(prompt.contains("`times` (integer)"));
    }

    #[test]
    fn test_match_intent_uses_whole_words() {
        let mut registry = ToolRegistry::new();
        registry.register_arc(RecordingSearchTool::shared()).unwrap();
        registry.register(echo_tool()).unwrap();

        let calls = registry.match_intent("Please search for Rust news");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "web_search");
        assert_eq!(calls[0].str_arg("query"), Some("Please search for Rust news"));

        assert!(registry.match_intent("my research notes").is_empty());
    }

    #[test]
    fn test_failed_result_observation() {
        let result = ToolResult::failure("x", "bad");
        assert_eq!(result.observation(), "Error: bad");
        let ok = ToolResult::success("x", json!({"a": 1}));
        assert!(ok.observation().contains("\"a\": 1"));
    }
}
