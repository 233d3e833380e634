use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::resilience::RetryPolicy;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
    pub session: SessionConfig,
    pub matchmaking: MatchmakingConfig,
    pub transcription: TranscriptionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    /// Largest inbound WebSocket frame accepted, in bytes
    pub max_message_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8000,
            max_message_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL URL. Empty selects the in-memory store.
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Hs256,
    Rs256,
    /// Decode claims without verifying the signature
    Unverified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub mode: AuthMode,
    /// HS256 signing secret; there is no usable default
    pub secret: String,
    pub public_key_path: Option<String>,
    pub leeway_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Hs256,
            secret: String::new(),
            public_key_path: None,
            leeway_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Chat messages longer than this (in characters) are dropped
    pub max_chat_length: usize,
    pub store_timeout_ms: u64,
    pub store_retries: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_chat_length: 2000,
            store_timeout_ms: 3000,
            store_retries: 2,
        }
    }
}

impl SessionConfig {
    /// Retry policy for store calls on the admission path
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(self.store_timeout_ms), self.store_retries)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingConfig {
    pub room_code_length: usize,
    pub max_code_attempts: usize,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            room_code_length: 6,
            max_code_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub api_key: String,
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.assemblyai.com".to_string(),
            poll_interval_ms: 1000,
            timeout_seconds: 120,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // DEBATEHUB_SERVER__HTTP_PORT, DEBATEHUB_AUTH__SECRET, ...
        builder = builder.add_source(
            Environment::with_prefix("DEBATEHUB")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }

    #[must_use]
    pub fn uses_database(&self) -> bool {
        !self.database.url.trim().is_empty()
    }

    /// Check cross-field constraints, collecting every problem found
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.http_port == 0 {
            errors.push("server.http_port must be non-zero".to_string());
        }
        if self.server.max_message_bytes == 0 {
            errors.push("server.max_message_bytes must be non-zero".to_string());
        }
        if self.uses_database() && self.database.max_connections < self.database.min_connections {
            errors.push(
                "database.max_connections must be >= database.min_connections".to_string(),
            );
        }
        match self.auth.mode {
            AuthMode::Hs256 if self.auth.secret.trim().is_empty() => {
                errors.push("auth.secret is required when auth.mode = hs256".to_string());
            }
            AuthMode::Rs256 if self.auth.public_key_path.is_none() => {
                errors.push("auth.public_key_path is required when auth.mode = rs256".to_string());
            }
            _ => {}
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format must be \"json\" or \"pretty\", got \"{}\"",
                self.logging.format
            ));
        }
        if self.session.max_chat_length == 0 {
            errors.push("session.max_chat_length must be non-zero".to_string());
        }
        if self.session.store_timeout_ms == 0 {
            errors.push("session.store_timeout_ms must be non-zero".to_string());
        }
        let len = self.matchmaking.room_code_length;
        if !(crate::models::ROOM_CODE_MIN_LEN..=crate::models::ROOM_CODE_MAX_LEN).contains(&len) {
            errors.push(format!(
                "matchmaking.room_code_length must be between {} and {}",
                crate::models::ROOM_CODE_MIN_LEN,
                crate::models::ROOM_CODE_MAX_LEN
            ));
        }
        if self.matchmaking.max_code_attempts == 0 {
            errors.push("matchmaking.max_code_attempts must be non-zero".to_string());
        }
        if self.transcription.poll_interval_ms == 0 {
            errors.push("transcription.poll_interval_ms must be non-zero".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.http_port, 8000);
        assert!(!config.uses_database());
        assert_eq!(config.auth.mode, AuthMode::Hs256);
        assert_eq!(config.matchmaking.room_code_length, 6);
        assert!(config.auth.secret.is_empty());
    }

    #[test]
    fn test_default_config_requires_a_secret() {
        let errors = Config::default().validate().unwrap_err();
        assert_eq!(errors, vec!["auth.secret is required when auth.mode = hs256".to_string()]);

        let mut config = Config::default();
        config.auth.secret = "   ".to_string();
        assert!(config.validate().is_err());

        config.auth.secret = "a-deployment-specific-secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_address() {
        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                http_port: 9000,
                ..ServerConfig::default()
            },
            ..Config::default()
        };
        assert_eq!(config.http_address(), "127.0.0.1:9000");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "server:\n  http_port: 9100\nauth:\n  mode: unverified\nmatchmaking:\n  room_code_length: 8"
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.http_port, 9100);
        assert_eq!(config.auth.mode, AuthMode::Unverified);
        assert_eq!(config.matchmaking.room_code_length, 8);
        assert_eq!(config.session.max_chat_length, 2000);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::from_file("/nonexistent/debatehub.yaml").unwrap();
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_environment_overrides_file() {
        std::env::set_var("DEBATEHUB_TRANSCRIPTION__TIMEOUT_SECONDS", "7");
        let config = Config::from_env().unwrap();
        std::env::remove_var("DEBATEHUB_TRANSCRIPTION__TIMEOUT_SECONDS");

        assert_eq!(config.transcription.timeout_seconds, 7);
        assert_eq!(config.transcription.poll_interval_ms, 1000);
    }

    #[test]
    fn test_validate_collects_every_error() {
        let config = Config {
            auth: AuthConfig {
                mode: AuthMode::Rs256,
                public_key_path: None,
                ..AuthConfig::default()
            },
            logging: LoggingConfig {
                format: "xml".to_string(),
                ..LoggingConfig::default()
            },
            matchmaking: MatchmakingConfig {
                room_code_length: 3,
                max_code_attempts: 0,
            },
            ..Config::default()
        };

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("public_key_path")));
        assert!(errors.iter().any(|e| e.contains("logging.format")));
    }

    #[test]
    fn test_retry_policy_from_session() {
        let policy = SessionConfig {
            store_timeout_ms: 250,
            store_retries: 4,
            ..SessionConfig::default()
        }
        .retry_policy();
        assert_eq!(policy.attempt_timeout, Duration::from_millis(250));
        assert_eq!(policy.max_retries, 4);
    }
}
