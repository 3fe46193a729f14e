//! Provider Router
//!
//! Uniform chat-completion call across interchangeable backend profiles.
//! Each attempt is bounded by a timeout and can be cancelled; failed attempts
//! are retried with exponential backoff, then the router fails over to the
//! remaining profiles in configured order, visiting each at most once per
//! request. When nothing answers the caller gets `ProviderUnavailable`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{Completion, GenerationOptions, LlmProvider};

/// Retry, backoff and timeout settings applied to every profile
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt, per profile
    pub max_retries: u32,

    /// Delay before the first retry; doubled on each subsequent retry
    pub initial_backoff: Duration,

    /// Upper bound for a single backoff delay
    pub max_backoff: Duration,

    /// Timeout for a single backend attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(4),
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (0-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Routes completions to the active profile with retry and failover
pub struct ProviderRouter {
    providers: Vec<Arc<dyn LlmProvider>>,
    active: usize,
    policy: RetryPolicy,
}

impl std::fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRouter")
            .field("profiles", &self.profile_names())
            .field("active", &self.active_profile())
            .field("policy", &self.policy)
            .finish()
    }
}

impl ProviderRouter {
    /// Create a router over `providers`, with `active` naming the default profile
    pub fn new(
        providers: Vec<Arc<dyn LlmProvider>>,
        active: &str,
        policy: RetryPolicy,
    ) -> Result<Self> {
        if providers.is_empty() {
            return Err(AgentError::Config("no provider profiles configured".into()));
        }

        let active_idx = providers
            .iter()
            .position(|p| p.name().eq_ignore_ascii_case(active))
            .ok_or_else(|| {
                AgentError::Config(format!(
                    "active profile '{active}' is not configured (available: {})",
                    providers.iter().map(|p| p.name()).collect::<Vec<_>>().join(", ")
                ))
            })?;

        Ok(Self {
            providers,
            active: active_idx,
            policy,
        })
    }

    /// Router over a single backend with default policy
    pub fn single(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            providers: vec![provider],
            active: 0,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Name of the active profile
    pub fn active_profile(&self) -> &str {
        self.providers[self.active].name()
    }

    /// Default model of the active profile
    pub fn active_model(&self) -> &str {
        self.providers[self.active].default_model()
    }

    /// All configured profile names in failover order
    pub fn profile_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Longest a single `complete` call can take before every profile is
    /// exhausted: all attempts timing out plus the backoff between them
    pub fn request_budget(&self) -> Duration {
        let attempts = self.policy.max_retries.saturating_add(1);
        let backoff: Duration = (0..self.policy.max_retries).map(|retry| self.policy.backoff(retry)).sum();
        let per_profile = self.policy.attempt_timeout.saturating_mul(attempts).saturating_add(backoff);
        per_profile.saturating_mul(u32::try_from(self.providers.len()).unwrap_or(u32::MAX))
    }

    /// Health of the active profile
    pub async fn health_check(&self) -> bool {
        self.providers[self.active]
            .health_check()
            .await
            .unwrap_or(false)
    }

    /// Complete with no external cancellation
    pub async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        self.complete_cancellable(messages, options, &CancellationToken::new())
            .await
    }

    /// Complete, aborting the in-flight attempt as soon as `cancel` fires
    pub async fn complete_cancellable(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
        cancel: &CancellationToken,
    ) -> Result<Completion> {
        let order = self.attempt_order(options.profile.as_deref())?;
        let primary = order[0];
        let mut last_error: Option<AgentError> = None;

        for idx in order {
            let provider = &self.providers[idx];

            // A model override only makes sense for the profile it was meant for.
            let profile_options = if idx == primary {
                options.clone()
            } else {
                GenerationOptions {
                    model: None,
                    ..options.clone()
                }
            };

            for attempt in 0..=self.policy.max_retries {
                if cancel.is_cancelled() {
                    return Err(AgentError::Cancelled);
                }

                let call = tokio::time::timeout(
                    self.policy.attempt_timeout,
                    provider.complete(messages, &profile_options),
                );

                let outcome = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(AgentError::Cancelled),
                    outcome = call => outcome,
                };

                let error = match outcome {
                    Ok(Ok(mut completion)) if !completion.content.trim().is_empty() => {
                        tracing::debug!(profile = provider.name(), attempt, "completion received");
                        completion.profile = Some(provider.name().to_string());
                        return Ok(completion);
                    }
                    Ok(Ok(_)) => AgentError::Provider("backend returned an empty completion".into()),
                    Ok(Err(AgentError::Cancelled)) => return Err(AgentError::Cancelled),
                    Ok(Err(e)) => e,
                    Err(_) => AgentError::Timeout(self.policy.attempt_timeout.as_secs()),
                };

                tracing::warn!(
                    profile = provider.name(),
                    attempt = attempt + 1,
                    max_attempts = self.policy.max_retries + 1,
                    error = %error,
                    "provider attempt failed"
                );

                let retryable = error.is_retryable();
                last_error = Some(error);
                if !retryable {
                    break;
                }

                if attempt < self.policy.max_retries {
                    let delay = self.policy.backoff(attempt);
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(AgentError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }

            tracing::warn!(profile = provider.name(), "profile exhausted, failing over");
        }

        let detail = last_error.map_or_else(|| "no attempts made".to_string(), |e| e.to_string());
        Err(AgentError::ProviderUnavailable(format!(
            "all {} profile(s) exhausted; last error: {detail}",
            self.providers.len()
        )))
    }

    /// Requested (or active) profile first, then the rest in configured order
    fn attempt_order(&self, requested: Option<&str>) -> Result<Vec<usize>> {
        let primary = match requested {
            Some(name) => self
                .providers
                .iter()
                .position(|p| p.name().eq_ignore_ascii_case(name))
                .ok_or_else(|| AgentError::Config(format!("unknown provider profile '{name}'")))?,
            None => self.active,
        };

        let mut order = Vec::with_capacity(self.providers.len());
        order.push(primary);
        order.extend((0..self.providers.len()).filter(|&i| i != primary));
        Ok(order)
    }
}
