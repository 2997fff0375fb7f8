//! Configuration validation.
//!
//! Run after loading and after secret resolution; a service refuses to start
//! on any validation error.

use thiserror::Error;

use crate::{Config, ObservabilityConfig, SessionConfig, StoreConfig, TokenSecrets, TokenSettings};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid port: 0")]
    InvalidPort,

    #[error("invalid host: {0:?}")]
    InvalidHost(String),

    #[error("invalid store backend: {0} (must be one of: memory, mysql)")]
    InvalidStoreBackend(String),

    #[error("invalid session backend: {0} (must be one of: memory, redis)")]
    InvalidSessionBackend(String),

    #[error("missing connection string for backend: {0}")]
    MissingConnectionString(String),

    #[error("invalid session capacity: 0")]
    InvalidSessionCapacity,

    #[error("invalid bus channel capacity: 0")]
    InvalidBusCapacity,

    #[error("invalid token TTL: {0} must be > 0")]
    InvalidTokenTtl(&'static str),

    #[error("access token TTL must be shorter than refresh token TTL")]
    AccessOutlivesRefresh,

    #[error("token secret {0} is empty")]
    EmptySecret(&'static str),

    #[error("access and refresh token secrets must differ")]
    SharedSecret,

    #[error("invalid log level: {0} (must be one of: trace, debug, info, warn, error)")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0} (must be one of: pretty, compact, json)")]
    InvalidLogFormat(String),

    #[error("multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a loaded configuration.
pub fn validate(config: &Config) -> ValidationResult<()> {
    let mut errors = Vec::new();

    for (host, port) in [
        (&config.login.host, config.login.port),
        (&config.greeter.host, config.greeter.port),
    ] {
        if port == 0 {
            errors.push(ValidationError::InvalidPort);
        }
        if host.is_empty() {
            errors.push(ValidationError::InvalidHost(host.clone()));
        }
    }

    if let Err(e) = validate_store(&config.store) {
        errors.push(e);
    }
    if let Err(e) = validate_session(&config.session) {
        errors.push(e);
    }
    if config.bus.channel_capacity == 0 {
        errors.push(ValidationError::InvalidBusCapacity);
    }
    if let Err(e) = validate_tokens(&config.tokens) {
        errors.push(e);
    }
    if let Err(e) = validate_observability(&config.observability) {
        errors.push(e);
    }

    collapse(errors)
}

pub fn validate_store(config: &StoreConfig) -> ValidationResult<()> {
    match config.backend.as_str() {
        "memory" => Ok(()),
        "mysql" => {
            if config.connection_string.is_none() {
                return Err(ValidationError::MissingConnectionString("mysql".to_string()));
            }
            Ok(())
        }
        other => Err(ValidationError::InvalidStoreBackend(other.to_string())),
    }
}

pub fn validate_session(config: &SessionConfig) -> ValidationResult<()> {
    match config.backend.as_str() {
        "memory" => {
            if config.max_capacity == 0 {
                return Err(ValidationError::InvalidSessionCapacity);
            }
            Ok(())
        }
        "redis" => {
            if config.redis_url.is_none() {
                return Err(ValidationError::MissingConnectionString("redis".to_string()));
            }
            Ok(())
        }
        other => Err(ValidationError::InvalidSessionBackend(other.to_string())),
    }
}

pub fn validate_tokens(settings: &TokenSettings) -> ValidationResult<()> {
    if settings.access_ttl_minutes == 0 {
        return Err(ValidationError::InvalidTokenTtl("access_ttl_minutes"));
    }
    if settings.refresh_ttl_minutes == 0 {
        return Err(ValidationError::InvalidTokenTtl("refresh_ttl_minutes"));
    }
    if settings.access_ttl_minutes >= settings.refresh_ttl_minutes {
        return Err(ValidationError::AccessOutlivesRefresh);
    }
    Ok(())
}

/// Validate resolved signing material.
pub fn validate_secrets(secrets: &TokenSecrets) -> ValidationResult<()> {
    if secrets.access_secret.is_empty() {
        return Err(ValidationError::EmptySecret("access"));
    }
    if secrets.refresh_secret.is_empty() {
        return Err(ValidationError::EmptySecret("refresh"));
    }
    if secrets.access_secret == secrets.refresh_secret {
        return Err(ValidationError::SharedSecret);
    }
    Ok(())
}

pub fn validate_observability(config: &ObservabilityConfig) -> ValidationResult<()> {
    match config.log_level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        other => return Err(ValidationError::InvalidLogLevel(other.to_string())),
    }
    match config.log_format.as_str() {
        "pretty" | "compact" | "json" => Ok(()),
        other => Err(ValidationError::InvalidLogFormat(other.to_string())),
    }
}

fn collapse(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}
