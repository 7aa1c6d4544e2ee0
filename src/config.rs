use std::path::{Path, PathBuf};
use thiserror::Error;
use crate::types::AgentConfig;

pub const DEFAULT_API_BASE: &str = "http://localhost:4000";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BIND: &str = "127.0.0.1:8501";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for `{key}`: `{value}`")]
    InvalidValue { key: String, value: String },
    #[error("`{0}` must not be empty")]
    Empty(String),
}

/// Where the gateway lives and which model to ask.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub api_base:    String,
    pub api_key:     Option<String>,
    pub model:       String,
    pub max_retries: u32,
}

/// Mock data, generated quotes and the quote log.
#[derive(Clone, Debug)]
pub struct DataPaths {
    pub data_dir:   PathBuf,
    pub quotes_dir: PathBuf,
}

impl DataPaths {
    pub fn new(data_dir: impl Into<PathBuf>, quotes_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), quotes_dir: quotes_dir.into() }
    }

    /// Both directories under one root, as used by tests and the self-check.
    pub fn under(root: &Path) -> Self {
        Self::new(root.join("data"), root.join("quotes"))
    }

    pub fn products_csv(&self) -> PathBuf { self.data_dir.join("products.csv") }
    pub fn history_csv(&self)  -> PathBuf { self.data_dir.join("historical_quotes.csv") }
    pub fn log_csv(&self)      -> PathBuf { self.data_dir.join("quotes_log.csv") }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub paths:   DataPaths,
    pub agent:   AgentConfig,
    pub server:  ServerConfig,
}

impl AppConfig {
    /// Reads the process environment (after loading `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_base = get("OPENAI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let agent = AgentConfig {
            max_steps: parse_or("SMARTQUOTE_MAX_STEPS", get("SMARTQUOTE_MAX_STEPS"), AgentConfig::default().max_steps)?,
            ..AgentConfig::default()
        };
        if agent.max_steps == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SMARTQUOTE_MAX_STEPS".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(Self {
            gateway: GatewayConfig {
                api_base,
                api_key:     get("OPENAI_API_KEY"),
                model:       get("SMARTQUOTE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                max_retries: parse_or("SMARTQUOTE_MAX_RETRIES", get("SMARTQUOTE_MAX_RETRIES"), 2)?,
            },
            paths: DataPaths::new(
                get("SMARTQUOTE_DATA_DIR").unwrap_or_else(|| "data".to_string()),
                get("SMARTQUOTE_QUOTES_DIR").unwrap_or_else(|| "quotes".to_string()),
            ),
            agent,
            server: ServerConfig {
                bind_address: get("SMARTQUOTE_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.api_base.trim().is_empty() {
            return Err(ConfigError::Empty("api_base".to_string()));
        }
        if self.gateway.model.trim().is_empty() {
            return Err(ConfigError::Empty("model".to_string()));
        }
        if self.agent.max_steps == 0 {
            return Err(ConfigError::InvalidValue { key: "max_steps".to_string(), value: "0".to_string() });
        }
        Ok(())
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_local_gateway() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.gateway.api_base, DEFAULT_API_BASE);
        assert_eq!(config.gateway.model, DEFAULT_MODEL);
        assert_eq!(config.gateway.api_key, None);
        assert_eq!(config.paths.products_csv(), PathBuf::from("data/products.csv"));
        assert_eq!(config.paths.quotes_dir, PathBuf::from("quotes"));
        assert_eq!(config.server.bind_address, DEFAULT_BIND);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn environment_overrides_apply() {
        let config = AppConfig::from_lookup(lookup(&[
            ("OPENAI_API_BASE", "http://gateway:4000/v1"),
            ("OPENAI_API_KEY", "sk-test"),
            ("SMARTQUOTE_MODEL", "gpt-4o-mini"),
            ("SMARTQUOTE_MAX_STEPS", "12"),
            ("SMARTQUOTE_QUOTES_DIR", "/tmp/out"),
        ])).unwrap();
        assert_eq!(config.gateway.api_base, "http://gateway:4000/v1");
        assert_eq!(config.gateway.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.gateway.model, "gpt-4o-mini");
        assert_eq!(config.agent.max_steps, 12);
        assert_eq!(config.paths.quotes_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "  ")])).unwrap();
        assert_eq!(config.gateway.api_key, None);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("SMARTQUOTE_MAX_RETRIES", "many")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidValue {
            key: "SMARTQUOTE_MAX_RETRIES".to_string(),
            value: "many".to_string(),
        });
        assert!(AppConfig::from_lookup(lookup(&[("SMARTQUOTE_MAX_STEPS", "0")])).is_err());
    }
}
