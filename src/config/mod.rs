//! Configuration subsystem.
//!
//! # Responsibilities
//! - Define the configuration schema (TOML-backed, serde defaults)
//! - Load and validate configuration files
//! - Apply environment-variable overrides for secrets
//!
//! # Design Decisions
//! - Config is immutable once loaded; behavior differences (dev vs prod)
//!   flow from the explicit `environment` field, never ambient globals

pub mod loader;
pub mod schema;

pub use loader::{load_config, validate_config, ConfigError};
pub use schema::{
    AppConfig, AssetsConfig, AuthConfig, CorsConfig, Environment, LimitsConfig, ListenerConfig,
    ObservabilityConfig, RateLimitConfig, SecurityConfig,
};
