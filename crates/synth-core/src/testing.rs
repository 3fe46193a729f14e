//! Test doubles shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{Completion, GenerationOptions, LlmProvider};
use crate::tool::{ParameterSchema, Tool, ToolInvocation, ToolOutput, ToolSchema};

/// Provider that replays a fixed script of replies and records every request
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<Result<String>>>,
    always_fail: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub fn new(name: &str, replies: Vec<&str>) -> Self {
        Self::from_results(name, replies.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn from_results(name: &str, results: Vec<Result<String>>) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(results.into()),
            always_fail: false,
            delay: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: &str) -> Self {
        let mut provider = Self::from_results(name, Vec::new());
        provider.always_fail = true;
        provider
    }

    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(
        &self,
        messages: &[Message],
        _options: &GenerationOptions,
    ) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(messages.to_vec());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.always_fail {
            return Err(AgentError::Provider("connection refused".into()));
        }

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(text)) => Ok(Completion::new(text, "scripted-model")),
            Some(Err(e)) => Err(e),
            None => Err(AgentError::Provider("script exhausted".into())),
        }
    }
}

/// `web_search` stand-in that records the arguments it was called with
#[derive(Default)]
pub struct RecordingSearchTool {
    pub calls: Mutex<Vec<serde_json::Map<String, serde_json::Value>>>,
}

impl RecordingSearchTool {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Tool for RecordingSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new("web_search", "Search the web for up-to-date information")
            .param(ParameterSchema::string("query", "Search query").required())
            .keywords(["search", "look up", "latest"])
    }

    async fn execute(&self, call: &ToolInvocation) -> Result<ToolOutput> {
        self.calls.lock().unwrap().push(call.arguments.clone());
        let query = call.str_arg("query").unwrap_or_default();
        Ok(ToolOutput::text(format!("Top result for '{query}': example.com")))
    }
}

/// Tool that sleeps before answering
pub struct SlowTool {
    name: &'static str,
    delay: Duration,
    model_backed: bool,
}

impl SlowTool {
    pub const fn new(name: &'static str, delay: Duration) -> Self {
        Self {
            name,
            delay,
            model_backed: false,
        }
    }

    pub const fn model_backed(mut self) -> Self {
        self.model_backed = true;
        self
    }
}

#[async_trait]
impl Tool for SlowTool {
    fn schema(&self) -> ToolSchema {
        let schema = ToolSchema::new(self.name, "Answers after a delay")
            .param(ParameterSchema::string("input", "Anything").required());
        if self.model_backed { schema.model_backed() } else { schema }
    }

    async fn execute(&self, _: &ToolInvocation) -> Result<ToolOutput> {
        tokio::time::sleep(self.delay).await;
        Ok(ToolOutput::text("done"))
    }
}
