//! Observability subsystem.
//!
//! # Responsibilities
//! - Initialize structured logging (tracing + EnvFilter)
//! - Record request counters/latency and rate-limit rejections
//! - Expose a Prometheus scrape endpoint when enabled

pub mod logging;
pub mod metrics;
