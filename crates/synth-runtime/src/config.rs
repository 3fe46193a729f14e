//! Provider configuration
//!
//! Profiles are read from the environment:
//!
//! ```text
//! MODEL_SERVER=GROQ                 active profile
//! PROVIDER_PROFILES=GROQ,NGU        failover order
//! GROQ_API_KEY / GROQ_BASE_URL / GROQ_MODEL
//! PROVIDER_TIMEOUT_SECS=60  PROVIDER_MAX_RETRIES=2  PROVIDER_BACKOFF_MS=250
//! ```
//!
//! Parsing goes through a lookup function so it can be exercised without
//! touching the process environment.

use std::str::FromStr;
use std::time::Duration;

use synth_core::{AgentError, Result, RetryPolicy};

/// Default active profile
pub const DEFAULT_MODEL_SERVER: &str = "GROQ";

/// Default failover order
pub const DEFAULT_PROFILES: &str = "GROQ,NGU";

/// One configured backend: endpoint, credential and default model
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub name: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ProviderProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderProfile")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ProviderProfile {
    /// Read `<NAME>_BASE_URL`, `<NAME>_MODEL` and `<NAME>_API_KEY`.
    ///
    /// Returns `None` when the base URL or the model is missing.
    pub fn from_lookup(name: &str, lookup: &impl Fn(&str) -> Option<String>) -> Option<Self> {
        let var = |suffix: &str| {
            lookup(&format!("{name}_{suffix}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Some(Self {
            name: name.to_string(),
            base_url: var("BASE_URL")?,
            model: var("MODEL")?,
            api_key: var("API_KEY"),
        })
    }
}

/// Everything needed to build the provider router
#[derive(Clone, Debug)]
pub struct RouterSettings {
    /// Active profile name
    pub active: String,

    /// Usable profiles in failover order
    pub profiles: Vec<ProviderProfile>,

    pub policy: RetryPolicy,
}

impl RouterSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let active = lookup("MODEL_SERVER")
            .map(|v| v.trim().to_uppercase())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL_SERVER.into());

        let mut names: Vec<String> = Vec::new();
        for name in lookup("PROVIDER_PROFILES")
            .unwrap_or_else(|| DEFAULT_PROFILES.into())
            .split(',')
            .map(|n| n.trim().to_uppercase())
        {
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
        if !names.contains(&active) {
            names.insert(0, active.clone());
        }

        let profiles: Vec<ProviderProfile> = names
            .iter()
            .filter_map(|name| {
                let profile = ProviderProfile::from_lookup(name, &lookup);
                if profile.is_none() {
                    tracing::warn!(profile = %name, "profile skipped: base URL or model not set");
                }
                profile
            })
            .collect();

        if !profiles.iter().any(|p| p.name == active) {
            return Err(AgentError::Config(format!(
                "MODEL_SERVER '{active}' has no usable profile; set {active}_BASE_URL and {active}_MODEL"
            )));
        }

        let defaults = RetryPolicy::default();
        let policy = RetryPolicy {
            max_retries: parse_var(&lookup, "PROVIDER_MAX_RETRIES", defaults.max_retries)?,
            initial_backoff: Duration::from_millis(parse_var(
                &lookup,
                "PROVIDER_BACKOFF_MS",
                u64::try_from(defaults.initial_backoff.as_millis()).unwrap_or(250),
            )?),
            attempt_timeout: Duration::from_secs(parse_var(
                &lookup,
                "PROVIDER_TIMEOUT_SECS",
                defaults.attempt_timeout.as_secs(),
            )?),
            ..defaults
        };

        Ok(Self {
            active,
            profiles,
            policy,
        })
    }
}

/// Parse `key` with `FromStr`, falling back to `default` when unset or blank
pub fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).map(|v| v.trim().to_string()) {
        Some(value) if !value.is_empty() => value
            .parse()
            .map_err(|e| AgentError::Config(format!("{key}='{value}' is invalid: {e}"))),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    const GROQ: [(&str, &str); 3] = [
        ("GROQ_BASE_URL", "https://api.groq.com/openai/v1"),
        ("GROQ_MODEL", "llama-3.3-70b-versatile"),
        ("GROQ_API_KEY", "gsk-test"),
    ];

    #[test]
    fn test_defaults_with_groq_only() {
        let settings = RouterSettings::from_lookup(lookup(&GROQ)).unwrap();

        assert_eq!(settings.active, "GROQ");
        assert_eq!(settings.profiles.len(), 1);
        assert_eq!(settings.profiles[0].api_key.as_deref(), Some("gsk-test"));
        assert_eq!(settings.policy, RetryPolicy::default());
    }

    #[test]
    fn test_profiles_keep_failover_order() {
        let mut vars = GROQ.to_vec();
        vars.extend([
            ("MODEL_SERVER", "ngu"),
            ("NGU_BASE_URL", "https://ngullama.example/v1"),
            ("NGU_MODEL", "qwen2.5"),
            ("PROVIDER_MAX_RETRIES", "4"),
            ("PROVIDER_TIMEOUT_SECS", "15"),
        ]);
        let settings = RouterSettings::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(settings.active, "NGU");
        let names: Vec<_> = settings.profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["GROQ", "NGU"]);
        assert_eq!(settings.profiles[1].api_key, None);
        assert_eq!(settings.policy.max_retries, 4);
        assert_eq!(settings.policy.attempt_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_unconfigured_active_profile_is_error() {
        let err = RouterSettings::from_lookup(lookup(&[("MODEL_SERVER", "OPENAI")])).unwrap_err();
        assert!(err.to_string().contains("OPENAI_BASE_URL"));
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let mut vars = GROQ.to_vec();
        vars.push(("PROVIDER_MAX_RETRIES", "many"));
        let err = RouterSettings::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let settings = RouterSettings::from_lookup(lookup(&GROQ)).unwrap();
        let debug = format!("{:?}", settings.profiles[0]);
        assert!(!debug.contains("gsk-test"));
        assert!(debug.contains("<redacted>"));
    }
}
