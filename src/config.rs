//! Process configuration read from the environment.
//!
//! Every setting has a typed default, so an empty environment yields a
//! working in-memory server. Unparseable values fall back to the default.

use std::path::PathBuf;
use std::time::Duration;

use crate::services::lint::LintConfig;
use crate::services::snippet::SnippetLimits;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_TOKEN_TTL_SECS: u64 = 6000;
const DEFAULT_BCRYPT_COST: u32 = 12;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// `None` runs on the in-memory stores.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Ed25519 seed file. `None` uses an ephemeral key.
    pub token_key_file: Option<PathBuf>,
    pub token_ttl: Duration,
    pub bcrypt_cost: u32,
    pub lint: LintConfig,
    pub snippets: SnippetLimits,
}

impl AppConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            database_url: env_string("DATABASE_URL"),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            token_key_file: env_string("TOKEN_KEY_FILE").map(PathBuf::from),
            token_ttl: Duration::from_secs(env_parse("TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)),
            bcrypt_cost: env_parse("BCRYPT_COST", DEFAULT_BCRYPT_COST),
            lint: LintConfig::from_env(),
            snippets: SnippetLimits::from_env(),
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Non-empty string value of `key`.
pub(crate) fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
