//! Configuration loading from disk.
//!
//! # Responsibilities
//! - Parse the TOML file into [`AppConfig`]
//! - Apply environment-variable overrides for secrets
//! - Semantic validation (serde handles syntactic)
//!
//! # Design Decisions
//! - Validation returns all errors, not just the first
//! - Runs before the config is accepted into the system

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// Environment variable letting deployments inject the signing secret
/// without writing it to the config file.
const JWT_SECRET_ENV: &str = "OUTFITTER_JWT_SECRET";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: AppConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Validate an already-built configuration (defaults, tests).
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(format!(
            "listener.bind_address is not a valid socket address: {}",
            config.listener.bind_address
        ));
    }
    if config.rate_limit.max_requests == 0 {
        errors.push("rate_limit.max_requests must be greater than zero".to_string());
    }
    if config.rate_limit.window_secs == 0 {
        errors.push("rate_limit.window_secs must be greater than zero".to_string());
    }
    if !config.rate_limit.prefix.starts_with('/') {
        errors.push("rate_limit.prefix must start with '/'".to_string());
    }
    if config.limits.body_limit_bytes == 0 {
        errors.push("limits.body_limit_bytes must be greater than zero".to_string());
    }
    if config.auth.jwt_secret.is_empty() && !config.environment.is_development() {
        errors.push(format!(
            "auth.jwt_secret must be set in production (or via {})",
            JWT_SECRET_ENV
        ));
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(format!(
            "observability.metrics_address is not a valid socket address: {}",
            config.observability.metrics_address
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(errors))
    }
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(secret) = std::env::var(JWT_SECRET_ENV) {
        if !secret.is_empty() {
            config.auth.jwt_secret = secret;
        }
    }
}
