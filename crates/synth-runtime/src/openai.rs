//! OpenAI-compatible chat-completion backend
//!
//! Groq, NGU and a local Ollama (`/v1`) all speak the same
//! `POST {base_url}/chat/completions` protocol, so one implementation of
//! `LlmProvider` covers every profile.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use synth_core::provider::{Completion, GenerationOptions, LlmProvider, TokenUsage};
use synth_core::{AgentError, Message, Result, Role};

use crate::config::ProviderProfile;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

/// `LlmProvider` over any OpenAI-compatible endpoint
pub struct OpenAiCompatibleProvider {
    profile: ProviderProfile,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(profile: ProviderProfile) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("synthesis-talk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AgentError::Config(format!("HTTP client for {}: {e}", profile.name)))?;

        Ok(Self { profile, client })
    }

    pub const fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.profile.base_url.trim_end_matches('/'))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.profile.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Tool output is sent as user context; the wire protocol's `tool` role
    /// requires a matching tool-call id
    const fn wire_role(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User | Role::Tool => "user",
            Role::Assistant => "assistant",
        }
    }

    fn convert_messages(messages: &[Message]) -> Vec<WireMessage<'_>> {
        messages
            .iter()
            .map(|m| WireMessage {
                role: Self::wire_role(m.role),
                content: &m.content,
            })
            .collect()
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.profile.name
    }

    fn default_model(&self) -> &str {
        &self.profile.model
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self.authorized(self.client.get(self.url("models"))).send().await;
        match response {
            Ok(r) => Ok(r.status().is_success()),
            Err(e) => {
                tracing::warn!(profile = %self.profile.name, error = %e, "health check failed");
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let model = options.model.as_deref().unwrap_or(&self.profile.model);
        let request = ChatRequest {
            model,
            messages: Self::convert_messages(messages),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let response = self
            .authorized(self.client.post(self.url("chat/completions")))
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::Provider(format!("{}: request failed: {e}", self.profile.name)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(AgentError::Provider(format!("{}: HTTP {status}: {snippet}", self.profile.name)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("{}: malformed response: {e}", self.profile.name)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AgentError::Provider(format!("{}: response had no choices", self.profile.name)))?;

        Ok(Completion {
            content,
            model: parsed.model.unwrap_or_else(|| model.to_string()),
            profile: Some(self.profile.name.clone()),
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }
}
