//! Client configuration: API base URL, token source, debounce window.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Quiet period for the debounced item sync, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_token_env() -> String {
    "RATEIO_TOKEN".to_string()
}

fn default_debounce_ms() -> u64 {
    1000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_env: default_token_env(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl ApiConfig {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Defaults overridden by `RATEIO_API_URL` and `RATEIO_TOKEN_ENV`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("RATEIO_API_URL") {
            if !url.is_empty() {
                config.base_url = url;
            }
        }
        if let Ok(var) = std::env::var("RATEIO_TOKEN_ENV") {
            if !var.is_empty() {
                config.token_env = var;
            }
        }
        config
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config: ApiConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.token_env, "RATEIO_TOKEN");
        assert_eq!(config.debounce_ms, 1000);
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "base_url": "https://api.rateio.app",
            "token_env": "MY_TOKEN",
            "debounce_ms": 250
        }"#;
        let config: ApiConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.base_url, "https://api.rateio.app");
        assert_eq!(config.token_env, "MY_TOKEN");
        assert_eq!(config.debounce(), Duration::from_millis(250));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rateio.json");
        std::fs::write(&path, r#"{"base_url": "http://10.0.0.5:3000"}"#).unwrap();
        let config = ApiConfig::load(&path).unwrap();
        assert_eq!(config.base_url, "http://10.0.0.5:3000");
        assert_eq!(config.debounce_ms, 1000);
    }
}
