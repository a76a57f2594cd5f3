//! Authentication subsystem.
//!
//! # Responsibilities
//! - Define the identity attached to authenticated requests
//! - Define the `Authenticator` seam the pipeline's auth stages call
//! - Provide the bundled session authenticator (JWT cookie lifecycle)
//!
//! # Design Decisions
//! - Identity resolution is optional by contract: the pipeline never fails
//!   a request just because no valid session is present; route handlers
//!   decide whether anonymity is acceptable

pub mod jwt;
pub mod session;

use async_trait::async_trait;

use crate::error::AppError;
use crate::http::request::Request;
use crate::http::response::Response;

pub use jwt::TokenCodec;
pub use session::{MemoryCredentials, SessionAuthenticator};

/// A verified logged-in user, attached to the request by the
/// optional-identity stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub name: String,
}

/// Seam between the pipeline and the identity provider.
///
/// `login`/`logout` terminate the pipeline with their own responses;
/// `identify` never fails the request, it merely declines.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Handle `POST /api/login`.
    async fn login(&self, req: &Request) -> Result<Response, AppError>;

    /// Handle `POST /api/logout`.
    async fn logout(&self, req: &Request) -> Result<Response, AppError>;

    /// Resolve a session token to an identity, if it is valid.
    async fn identify(&self, token: &str) -> Option<Identity>;
}

/// Seam to whatever verifies and stores user credentials (a database in the
/// real deployment).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Verify an email/password pair.
    async fn verify(&self, email: &str, password: &str) -> Option<Identity>;

    /// Look up a user by id (token subject).
    async fn lookup(&self, id: &str) -> Option<Identity>;
}
