//! Runtime configuration parsed from environment variables.
//!
//! Every knob has a typed default; malformed values fall back to the default
//! rather than failing startup.

use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SESSION_MAILBOX_CAPACITY: usize = 256;
pub const DEFAULT_TRANSFORM_DEBOUNCE_MS: u64 = 150;
pub const DEFAULT_STORE_CHANGE_CAPACITY: usize = 1024;
pub const DEFAULT_PLAYBACK_MAX_STEP_MS: u64 = 5000;

/// Parse `key` from the environment, or return `default` when it is unset
/// or does not parse.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Read a non-blank string variable.
pub(crate) fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub store_change_capacity: usize,
}

impl ServerConfig {
    /// Load from `PORT`, `DATABASE_URL`, `STORE_CHANGE_CAPACITY`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            database_url: env_string("DATABASE_URL"),
            store_change_capacity: env_parse("STORE_CHANGE_CAPACITY", DEFAULT_STORE_CHANGE_CAPACITY),
        }
    }
}

/// Per-session tuning shared by every websocket session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub mailbox_capacity: usize,
    pub transform_debounce: Duration,
    pub playback_max_step: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_SESSION_MAILBOX_CAPACITY,
            transform_debounce: Duration::from_millis(DEFAULT_TRANSFORM_DEBOUNCE_MS),
            playback_max_step: Duration::from_millis(DEFAULT_PLAYBACK_MAX_STEP_MS),
        }
    }
}

impl SessionConfig {
    /// Load from `SESSION_MAILBOX_CAPACITY`, `TRANSFORM_DEBOUNCE_MS`,
    /// `PLAYBACK_MAX_STEP_MS`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            mailbox_capacity: env_parse("SESSION_MAILBOX_CAPACITY", DEFAULT_SESSION_MAILBOX_CAPACITY).max(1),
            transform_debounce: Duration::from_millis(env_parse(
                "TRANSFORM_DEBOUNCE_MS",
                DEFAULT_TRANSFORM_DEBOUNCE_MS,
            )),
            playback_max_step: Duration::from_millis(env_parse("PLAYBACK_MAX_STEP_MS", DEFAULT_PLAYBACK_MAX_STEP_MS)),
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
