//! # Greeter Config - Configuration Management
//!
//! Handles configuration loading from files and environment variables for
//! the login and greeter services.
//!
//! Token secrets never live in configuration files; the file carries the
//! *names* of the secrets and [`secrets::SecretProvider`] resolves them at
//! startup.

pub mod secrets;
pub mod validation;

use std::path::Path;
use std::time::Duration;

use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use secrets::{SecretError, SecretProvider};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub login: ServiceConfig,
    #[serde(default)]
    pub greeter: GreeterServiceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub bus: BusSettings,
    #[serde(default)]
    pub tokens: TokenSettings,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Bind address of the login service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_login_port")]
    pub port: u16,
}

/// Bind address of the greeter service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GreeterServiceConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_greeter_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_login_port() -> u16 {
    8080
}

fn default_greeter_port() -> u16 {
    8081
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_login_port() }
    }
}

impl Default for GreeterServiceConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_greeter_port() }
    }
}

/// Backend selection for the authoritative user store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `memory` or `mysql`.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Required for the `mysql` backend, ignored otherwise.
    pub connection_string: Option<String>,
}

fn default_backend() -> String {
    "memory".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { backend: default_backend(), connection_string: None }
    }
}

/// Backend selection for the session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// `memory` or `redis`.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Required for the `redis` backend, ignored otherwise.
    pub redis_url: Option<String>,

    /// Capacity of the in-memory store; ignored for Redis.
    #[serde(default = "default_session_capacity")]
    pub max_capacity: u64,
}

fn default_session_capacity() -> u64 {
    100_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            redis_url: None,
            max_capacity: default_session_capacity(),
        }
    }
}

/// Event bus tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusSettings {
    /// Per-subscriber buffer; slow subscribers past this lose events.
    #[serde(default = "default_bus_capacity")]
    pub channel_capacity: usize,
}

fn default_bus_capacity() -> usize {
    1024
}

impl Default for BusSettings {
    fn default() -> Self {
        Self { channel_capacity: default_bus_capacity() }
    }
}

/// Token signing settings.
///
/// Carries secret *names* and validity windows; call
/// [`TokenSettings::resolve`] to obtain actual signing material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSettings {
    #[serde(default = "default_access_secret_name")]
    pub access_secret_name: String,

    #[serde(default = "default_refresh_secret_name")]
    pub refresh_secret_name: String,

    #[serde(default = "default_access_ttl_minutes")]
    pub access_ttl_minutes: u64,

    #[serde(default = "default_refresh_ttl_minutes")]
    pub refresh_ttl_minutes: u64,
}

fn default_access_secret_name() -> String {
    "ACCESS_TOKEN_SECRET".to_string()
}

fn default_refresh_secret_name() -> String {
    "REFRESH_TOKEN_SECRET".to_string()
}

fn default_access_ttl_minutes() -> u64 {
    15
}

fn default_refresh_ttl_minutes() -> u64 {
    7 * 24 * 60
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            access_secret_name: default_access_secret_name(),
            refresh_secret_name: default_refresh_secret_name(),
            access_ttl_minutes: default_access_ttl_minutes(),
            refresh_ttl_minutes: default_refresh_ttl_minutes(),
        }
    }
}

/// Resolved token signing material.
#[derive(Clone)]
pub struct TokenSecrets {
    pub access_secret: String,
    pub access_ttl: Duration,
    pub refresh_secret: String,
    pub refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secrets stay out of logs
        f.debug_struct("TokenSecrets")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenSettings {
    /// Resolve secret names into signing material.
    pub fn resolve(&self, provider: &dyn SecretProvider) -> Result<TokenSecrets, SecretError> {
        Ok(TokenSecrets {
            access_secret: provider.get(&self.access_secret_name)?,
            access_ttl: Duration::from_secs(self.access_ttl_minutes * 60),
            refresh_secret: provider.get(&self.refresh_secret_name)?,
            refresh_ttl: Duration::from_secs(self.refresh_ttl_minutes * 60),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// `pretty`, `compact`, or `json`.
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: default_log_level(), log_format: default_log_format() }
    }
}

/// Load configuration from file and environment.
///
/// Environment variables use the `GREETER` prefix with `__` as the section
/// separator, e.g. `GREETER__LOGIN__PORT=9090`.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let builder = ConfigBuilder::builder()
        .add_source(File::from(path.as_ref()).required(false))
        .add_source(Environment::with_prefix("GREETER").separator("__"))
        .build()?;

    builder.try_deserialize()
}

/// Load configuration, falling back to defaults on any error.
pub fn load_or_default<P: AsRef<Path>>(path: P) -> Config {
    load(path).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrets::StaticSecretProvider;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.login.port, 8080);
        assert_eq!(config.greeter.port, 8081);
        assert_eq!(config.store.backend, "memory");
        assert_eq!(config.session.backend, "memory");
        assert_eq!(config.tokens.access_ttl_minutes, 15);
        assert_eq!(config.tokens.refresh_ttl_minutes, 10_080);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = load_or_default("/definitely/not/a/config.toml");
        assert_eq!(config.bus.channel_capacity, 1024);
    }

    #[test]
    fn test_resolve_token_secrets() {
        let provider = StaticSecretProvider::new([
            ("ACCESS_TOKEN_SECRET", "a-secret"),
            ("REFRESH_TOKEN_SECRET", "r-secret"),
        ]);
        let secrets = TokenSettings::default().resolve(&provider).unwrap();

        assert_eq!(secrets.access_secret, "a-secret");
        assert_eq!(secrets.refresh_secret, "r-secret");
        assert_eq!(secrets.access_ttl, Duration::from_secs(900));
        assert_eq!(secrets.refresh_ttl, Duration::from_secs(604_800));
    }

    #[test]
    fn test_resolve_missing_secret() {
        let provider = StaticSecretProvider::new([("ACCESS_TOKEN_SECRET", "a-secret")]);
        assert!(TokenSettings::default().resolve(&provider).is_err());
    }

    #[test]
    fn test_token_secrets_debug_redacts() {
        let secrets = TokenSecrets {
            access_secret: "hide-me".to_string(),
            access_ttl: Duration::from_secs(900),
            refresh_secret: "hide-me-too".to_string(),
            refresh_ttl: Duration::from_secs(604_800),
        };
        let rendered = format!("{:?}", secrets);
        assert!(!rendered.contains("hide-me"));
    }
}
