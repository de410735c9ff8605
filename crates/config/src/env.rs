use scf_common::error::{ScfError, ScfResult};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Process-level settings shared by every binary in the workspace.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub log_level: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> ScfResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: get_var("DATABASE_URL")?,
            log_level: get_var_or("LOG_LEVEL", "info"),
        })
    }
}

pub fn get_var(key: &str) -> ScfResult<String> {
    env::var(key).map_err(|_| ScfError::Config(format!("{key} is required but not set")))
}

pub fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Returns `None` for unset or blank variables.
pub fn get_var_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an optional variable, falling back to `default` when unset.
/// A value that is set but unparsable is a configuration error.
pub fn parse_var_or<T>(key: &str, default: T) -> ScfResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_var_opt(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ScfError::Config(format!("invalid {key}: {e}"))),
        None => Ok(default),
    }
}
