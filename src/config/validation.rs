//! Configuration validation utilities.

use std::sync::OnceLock;
use std::time::Duration;

use regex::{Captures, Regex};
use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Parse a duration string such as `10s`, `500ms` or `1m30s` (humantime).
///
/// ```
/// use duckbridge::config::parse_duration;
///
/// assert_eq!(parse_duration("10s").unwrap().as_secs(), 10);
/// assert_eq!(parse_duration("1m30s").unwrap().as_secs(), 90);
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("duration string is empty".to_string());
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Expand `${VAR}` and `${VAR:-default}` references from the environment.
///
/// Unset variables without a default expand to the empty string.
pub fn expand_env_vars(input: &str) -> String {
    static ENV_VAR_REGEX: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

    let Ok(regex) =
        ENV_VAR_REGEX.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}"))
    else {
        return input.to_string();
    };

    regex
        .replace_all(input, |caps: &Captures| {
            let default = caps.get(2).map_or("", |m| m.as_str());
            std::env::var(&caps[1]).unwrap_or_else(|_| default.to_string())
        })
        .into_owned()
}
