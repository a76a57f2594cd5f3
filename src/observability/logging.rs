//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Pick a default filter from the environment mode
//!
//! # Design Decisions
//! - `RUST_LOG` wins, then the config override, then the mode default
//! - Development defaults to debug-level output, production to info

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Environment;

/// Initialize the global subscriber. Call once, before anything logs.
pub fn init(environment: Environment, filter_override: Option<&str>) {
    let default_filter = if environment.is_development() {
        "outfitter=debug,tower_http=debug"
    } else {
        "outfitter=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(filter_override.unwrap_or(default_filter))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
