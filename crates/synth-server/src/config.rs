//! Server configuration

use synth_core::Result;
use synth_core::reasoning::DEFAULT_MAX_ITERATIONS;
use synth_core::store::DEFAULT_MAX_CONTEXT_MESSAGES;
use synth_runtime::parse_var;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// Settings read once at startup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_context_messages: usize,
    pub react_max_iterations: usize,
    pub serpapi_key: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            bind_addr: parse_var(&lookup, "BIND_ADDR", DEFAULT_BIND_ADDR.to_string())?,
            max_context_messages: parse_var(&lookup, "MAX_CONTEXT_MESSAGES", DEFAULT_MAX_CONTEXT_MESSAGES)?,
            react_max_iterations: parse_var(&lookup, "REACT_MAX_ITERATIONS", DEFAULT_MAX_ITERATIONS)?,
            serpapi_key: lookup("SERPAPI_KEY").filter(|k| !k.trim().is_empty()),
        })
    }
}
