use std::{env, time::Duration};

use anyhow::{anyhow, Result};

pub const API_KEY_VARS: [&str; 2] = ["API_KEY", "GEMINI_API_KEY"];
pub const MODEL_VAR: &str = "DAILYFOCUS_MODEL";
pub const BASE_URL_VAR: &str = "DAILYFOCUS_AI_BASE_URL";
pub const TIMEOUT_VAR: &str = "DAILYFOCUS_AI_TIMEOUT_SECS";

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings of the text generation service. Without an api key every advice call answers with
/// its offline fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdviceConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for AdviceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl AdviceConfig {
    /// Reads the process environment. A `.env` file should already be loaded by then.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_key = API_KEY_VARS.iter().find_map(|name| non_empty(name));
        let timeout = match non_empty(TIMEOUT_VAR) {
            Some(value) => Duration::from_secs(
                value
                    .trim()
                    .parse()
                    .map_err(|e| anyhow!("Invalid {TIMEOUT_VAR} value {value:?}: {e}"))?,
            ),
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            api_key,
            model: non_empty(MODEL_VAR).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: non_empty(BASE_URL_VAR)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout,
        })
    }
}
