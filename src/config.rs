//! Process configuration
//!
//! Loaded once from the environment at startup and shared read-only.

use crate::memory::policy::{EvictionMode, RetentionPolicy, DEFAULT_MAX_TURNS};
use crate::models::{CallOptions, GenerationParams};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_API_URL: &str = "https://api.siliconflow.cn/v1";
pub const DEFAULT_MODEL: &str = "deepseek-ai/DeepSeek-V3";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub default_temperature: f32,
    pub default_max_tokens: u32,
    /// Retention limit in turns
    pub max_history: usize,
    pub eviction: EvictionMode,
    /// Re-seed the profile's system prompt after a clear
    pub keep_system_prompt_on_clear: bool,
    pub request_timeout: Option<Duration>,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            default_temperature: DEFAULT_TEMPERATURE,
            default_max_tokens: DEFAULT_MAX_TOKENS,
            max_history: DEFAULT_MAX_TURNS,
            eviction: EvictionMode::Messages,
            keep_system_prompt_on_clear: false,
            request_timeout: None,
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// Call `dotenv::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Malformed values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            api_url: get("SILICON_FLOW_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            api_key: get("SILICON_FLOW_API_KEY").unwrap_or_default(),
            model: get("CHAT_MODEL").unwrap_or(defaults.model),
            default_temperature: parse_or(get("CHAT_TEMPERATURE"), "CHAT_TEMPERATURE", defaults.default_temperature),
            default_max_tokens: parse_or(get("CHAT_MAX_TOKENS"), "CHAT_MAX_TOKENS", defaults.default_max_tokens),
            max_history: parse_or(get("CHAT_MAX_HISTORY"), "CHAT_MAX_HISTORY", defaults.max_history),
            eviction: parse_or(get("CHAT_EVICTION"), "CHAT_EVICTION", defaults.eviction),
            keep_system_prompt_on_clear: parse_or(
                get("CHAT_KEEP_SYSTEM_PROMPT_ON_CLEAR"),
                "CHAT_KEEP_SYSTEM_PROMPT_ON_CLEAR",
                defaults.keep_system_prompt_on_clear,
            ),
            // 0 or unset: no client timeout
            request_timeout: Some(parse_or(
                get("CHAT_REQUEST_TIMEOUT_SECS"),
                "CHAT_REQUEST_TIMEOUT_SECS",
                0u64,
            ))
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
            port: parse_or(get("PORT").or_else(|| get("API_PORT")), "PORT", defaults.port),
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy::new(self.max_history, self.eviction)
    }

    /// Apply configured defaults to per-call options
    pub fn generation_params(&self, options: &CallOptions) -> GenerationParams {
        GenerationParams {
            temperature: options.temperature.unwrap_or(self.default_temperature),
            max_tokens: options.max_tokens.unwrap_or(self.default_max_tokens),
            stop: options.stop.clone().filter(|stop| !stop.is_empty()),
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> T {
    match value {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}, using default", key, raw);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_history, 10);
        assert_eq!(config.port, 5000);
        assert!(!config.has_api_key());
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("SILICON_FLOW_API_KEY", "sk-test"),
            ("SILICON_FLOW_API_URL", "http://localhost:9000/v1/"),
            ("CHAT_MAX_HISTORY", "4"),
            ("CHAT_EVICTION", "turns"),
            ("CHAT_REQUEST_TIMEOUT_SECS", "30"),
            ("API_PORT", "8081"),
        ]);

        assert!(config.has_api_key());
        assert_eq!(config.api_url, "http://localhost:9000/v1");
        assert_eq!(config.retention_policy(), RetentionPolicy::new(4, EvictionMode::Turns));
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.port, 8081);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("CHAT_TEMPERATURE", "warm"),
            ("CHAT_MAX_HISTORY", "-3"),
            ("CHAT_REQUEST_TIMEOUT_SECS", "soon"),
        ]);
        assert_eq!(config.default_temperature, DEFAULT_TEMPERATURE);
        assert_eq!(config.max_history, DEFAULT_MAX_TURNS);
        assert!(config.request_timeout.is_none());

        let config = config_from(&[("CHAT_REQUEST_TIMEOUT_SECS", "0")]);
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn test_generation_params_apply_defaults() {
        let config = AppConfig::default();
        let params = config.generation_params(&CallOptions {
            temperature: Some(0.2),
            max_tokens: None,
            stop: Some(vec![]),
        });

        assert_eq!(params.temperature, 0.2);
        assert_eq!(params.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(params.stop.is_none());
    }
}
