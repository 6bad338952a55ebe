//! Server configuration.

use crate::game::Difficulty;
use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Configuration for the Side-Stacker server.
///
/// Loaded from a TOML file when one exists, with environment overrides
/// for the port (`PORT`) and database path (`SIDE_STACKER_DB`).
#[derive(Debug, Clone, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_")]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    host: String,

    /// Port to bind to.
    #[serde(default = "default_port")]
    port: u16,

    /// Path of the SQLite database file.
    #[serde(default = "default_database_path")]
    database_path: String,

    /// Minimax depth for the medium tier.
    #[serde(default = "default_medium_depth")]
    medium_search_depth: u32,

    /// Minimax depth for the hard tier.
    #[serde(default = "default_hard_depth")]
    hard_search_depth: u32,

    /// Base delay before a PvE AI reply, scaled up for stronger tiers so
    /// the bot reads as "thinking".
    #[serde(default = "default_ai_reply_delay_ms")]
    ai_reply_delay_ms: u64,

    /// Pacing interval between AVA moves, keeping the spectacle watchable.
    #[serde(default = "default_ava_pacing_ms")]
    ava_pacing_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_database_path() -> String {
    "side_stacker.db".to_string()
}

fn default_medium_depth() -> u32 {
    2
}

fn default_hard_depth() -> u32 {
    3
}

fn default_ai_reply_delay_ms() -> u64 {
    500
}

fn default_ava_pacing_ms() -> u64 {
    1000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_path: default_database_path(),
            medium_search_depth: default_medium_depth(),
            hard_search_depth: default_hard_depth(),
            ai_reply_delay_ms: default_ai_reply_delay_ms(),
            ava_pacing_ms: default_ava_pacing_ms(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(port = config.port, db = %config.database_path, "Config loaded");
        Ok(config)
    }

    /// Loads configuration from the given file if it exists (defaults
    /// otherwise) and applies environment overrides.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = if path.as_ref().exists() {
            Self::from_file(path)?
        } else {
            debug!("Config file not found, using defaults");
            Self::default()
        };

        if let Ok(port) = std::env::var("PORT") {
            config.port = port
                .parse()
                .map_err(|_| ConfigError::new(format!("Invalid PORT value: {}", port)))?;
        }
        if let Ok(db) = std::env::var("SIDE_STACKER_DB") {
            config.database_path = db;
        }

        Ok(config)
    }

    /// How long a PvE AI waits before replying, scaled by tier.
    pub fn ai_reply_delay(&self, difficulty: Difficulty) -> Duration {
        let multiplier = match difficulty {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
        };
        Duration::from_millis(self.ai_reply_delay_ms * multiplier)
    }

    /// Pacing interval between AVA moves.
    pub fn ava_pacing(&self) -> Duration {
        Duration::from_millis(self.ava_pacing_ms)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port(), &3000);
        assert_eq!(config.medium_search_depth(), &2);
        assert_eq!(config.hard_search_depth(), &3);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: ServerConfig =
            toml::from_str("port = 8080\nava_pacing_ms = 250").expect("parse failed");
        assert_eq!(config.port(), &8080);
        assert_eq!(config.ava_pacing(), Duration::from_millis(250));
        assert_eq!(config.database_path(), "side_stacker.db");
    }

    #[test]
    fn test_reply_delay_scales_with_tier() {
        let config = ServerConfig::default().with_ai_reply_delay_ms(100);
        assert_eq!(config.ai_reply_delay(Difficulty::Easy), Duration::from_millis(100));
        assert_eq!(config.ai_reply_delay(Difficulty::Hard), Duration::from_millis(300));
    }
}
