use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use thiserror::Error;

const MIN_BODY_LIMIT_BYTES: usize = 1024;
const MAX_BODY_LIMIT_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub body_limit_bytes: usize,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "SNAPSYNC_API_BIND_ADDR", "127.0.0.1:8080");
        let db_path = PathBuf::from(value_or_default(
            &lookup,
            "SNAPSYNC_API_DB_PATH",
            "snapsync-api.db",
        ));

        let body_limit_bytes =
            value_or_default(&lookup, "SNAPSYNC_API_BODY_LIMIT_BYTES", "8388608")
                .parse::<usize>()
                .map_err(|_| {
                    ConfigError::Invalid(
                        "SNAPSYNC_API_BODY_LIMIT_BYTES must be an integer in [1024, 67108864]"
                            .to_string(),
                    )
                })?;
        if !(MIN_BODY_LIMIT_BYTES..=MAX_BODY_LIMIT_BYTES).contains(&body_limit_bytes) {
            return Err(ConfigError::Invalid(
                "SNAPSYNC_API_BODY_LIMIT_BYTES must be in [1024, 67108864]".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            db_path,
            body_limit_bytes,
        })
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
