//! HTTP transport layer.
//!
//! # Responsibilities
//! - Pipeline-side request and response models
//! - The Axum adapter serving the pipeline over the network

pub mod request;
pub mod response;
pub mod server;

pub use server::HttpServer;
