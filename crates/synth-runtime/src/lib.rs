//! # synth-runtime
//!
//! Runtime providers for SynthesisTalk.
//!
//! Every configured profile (Groq, NGU, a local Ollama `/v1` endpoint, ...)
//! is served by [`OpenAiCompatibleProvider`]; [`router_from_env`] wires them
//! into a [`ProviderRouter`] in failover order.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use synth_runtime::router_from_env;
//!
//! let router = Arc::new(router_from_env()?);
//! let orchestrator = Orchestrator::builder().router(router).build()?;
//! ```

pub mod config;
pub mod openai;

use std::sync::Arc;

pub use config::{ProviderProfile, RouterSettings, parse_var};
pub use openai::OpenAiCompatibleProvider;
use synth_core::{LlmProvider, ProviderRouter, Result};

/// Build the router from already-parsed settings
pub fn router_from_settings(settings: &RouterSettings) -> Result<ProviderRouter> {
    let providers = settings
        .profiles
        .iter()
        .cloned()
        .map(|profile| {
            OpenAiCompatibleProvider::new(profile).map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
        })
        .collect::<Result<Vec<_>>>()?;

    let router = ProviderRouter::new(providers, &settings.active, settings.policy.clone())?;
    tracing::info!(
        active = router.active_profile(),
        model = router.active_model(),
        profiles = ?router.profile_names(),
        "provider router configured"
    );
    Ok(router)
}

/// Build the router from the process environment
pub fn router_from_env() -> Result<ProviderRouter> {
    router_from_settings(&RouterSettings::from_env()?)
}
