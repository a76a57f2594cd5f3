//! Hardened HTTP front door for a tour-booking platform.
//!
//! Every inbound request passes through a fixed, ordered pipeline of
//! cross-cutting stages (CORS, static assets, security headers, rate
//! limiting, body handling, sanitization, authentication) before any
//! business route handler runs. Business logic itself lives outside this
//! crate, behind the [`routes`] seams.

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod pipeline;

// Collaborator seams
pub mod auth;
pub mod routes;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::AppConfig;
pub use error::AppError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::Pipeline;
