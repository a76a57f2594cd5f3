//! Route-group and webhook seams.
//!
//! # Responsibilities
//! - Define the contract the dispatch stage forwards matched requests to
//! - Define the raw-body webhook contract for the payments provider
//!
//! # Design Decisions
//! - Business route handlers (tours, users, reviews, bookings, views) live
//!   outside this crate; groups are registered at pipeline construction
//! - A group may decline a request (`Ok(None)`) even when its prefix
//!   matched, letting the request fall through to later groups

use async_trait::async_trait;

use crate::error::AppError;
use crate::http::request::Request;
use crate::http::response::Response;

/// A mounted collection of route handlers sharing a path prefix.
#[async_trait]
pub trait RouteGroup: Send + Sync {
    /// Path prefix this group is mounted at, e.g. `/api/v1/tours`.
    fn prefix(&self) -> &str;

    /// Handle a request whose path matched `prefix`.
    ///
    /// `Ok(None)` declines the request without error.
    async fn handle(&self, req: &Request) -> Result<Option<Response>, AppError>;
}

/// Handler for the payment provider's checkout webhook.
///
/// Receives the exact raw payload bytes, never a parsed body, because
/// signature verification happens over the bytes as sent.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    async fn handle(&self, payload: &[u8], req: &Request) -> Result<Response, AppError>;
}

/// Default webhook handler when the deployment registered none.
pub struct UnconfiguredWebhook;

#[async_trait]
impl WebhookHandler for UnconfiguredWebhook {
    async fn handle(&self, _payload: &[u8], _req: &Request) -> Result<Response, AppError> {
        Err(AppError::internal("no webhook handler registered"))
    }
}
