//! Bundled session authenticator: JWT cookie lifecycle over a credential
//! store.
//!
//! # Responsibilities
//! - Verify login credentials and issue the session cookie
//! - Expire the session cookie on logout
//! - Resolve session tokens back to identities
//!
//! # Design Decisions
//! - The `Secure` cookie attribute follows the request's secure-transport
//!   classification, so cookies survive local development over plain HTTP
//! - Logout overwrites the cookie with an immediately-expiring placeholder
//!   instead of relying on client-side deletion

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::auth::{Authenticator, CredentialStore, Identity, TokenCodec};
use crate::error::AppError;
use crate::http::request::{Body, Request};
use crate::http::response::Response;

/// Placeholder written into the cookie on logout.
const LOGGED_OUT: &str = "loggedout";

/// Session authenticator backed by a [`CredentialStore`].
pub struct SessionAuthenticator {
    codec: TokenCodec,
    store: Arc<dyn CredentialStore>,
    cookie_name: String,
}

impl SessionAuthenticator {
    pub fn new(codec: TokenCodec, store: Arc<dyn CredentialStore>, cookie_name: String) -> Self {
        Self {
            codec,
            store,
            cookie_name,
        }
    }

    fn session_cookie(&self, token: &str, max_age_secs: u64, secure: bool) -> String {
        let mut cookie = format!(
            "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
            self.cookie_name, token, max_age_secs
        );
        if secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    fn credentials_from(req: &Request) -> Result<(String, String), AppError> {
        let doc = match req.body() {
            Body::Json(value) => value,
            _ => return Err(AppError::bad_request("Please provide email and password")),
        };
        let email = doc.get("email").and_then(|v| v.as_str());
        let password = doc.get("password").and_then(|v| v.as_str());
        match (email, password) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Ok((email.to_string(), password.to_string()))
            }
            _ => Err(AppError::bad_request("Please provide email and password")),
        }
    }
}

#[async_trait]
impl Authenticator for SessionAuthenticator {
    async fn login(&self, req: &Request) -> Result<Response, AppError> {
        let (email, password) = Self::credentials_from(req)?;

        let identity = self
            .store
            .verify(&email, &password)
            .await
            .ok_or_else(|| AppError::unauthorized("Incorrect email or password"))?;

        let token = self
            .codec
            .issue(&identity)
            .map_err(|e| AppError::internal_with("failed to issue session token", e))?;

        tracing::info!(user = %identity.id, "login succeeded");

        let mut res = Response::json(json!({
            "status": "success",
            "token": token,
            "data": { "user": { "id": identity.id, "name": identity.name } },
        }));
        res.add_cookie(&self.session_cookie(
            &token,
            self.codec.ttl_secs(),
            req.is_secure(),
        ));
        Ok(res)
    }

    async fn logout(&self, req: &Request) -> Result<Response, AppError> {
        let mut res = Response::json(json!({ "status": "success" }));
        // Max-Age=0 expires the cookie immediately.
        res.add_cookie(&self.session_cookie(LOGGED_OUT, 0, req.is_secure()));
        Ok(res)
    }

    async fn identify(&self, token: &str) -> Option<Identity> {
        if token == LOGGED_OUT {
            return None;
        }
        let claimed = self.codec.verify(token).ok()?;
        // The store is authoritative; the token alone is not enough if the
        // user no longer exists.
        self.store.lookup(&claimed.id).await
    }
}

/// In-memory credential store for bootstrap wiring and tests.
#[derive(Default)]
pub struct MemoryCredentials {
    users: std::sync::RwLock<HashMap<String, (String, Identity)>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, email: &str, password: &str, identity: Identity) {
        self.users
            .write()
            .expect("credential store lock poisoned")
            .insert(email.to_string(), (password.to_string(), identity));
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentials {
    async fn verify(&self, email: &str, password: &str) -> Option<Identity> {
        let users = self.users.read().expect("credential store lock poisoned");
        let (stored, identity) = users.get(email)?;
        if stored == password {
            Some(identity.clone())
        } else {
            None
        }
    }

    async fn lookup(&self, id: &str) -> Option<Identity> {
        let users = self.users.read().expect("credential store lock poisoned");
        users
            .values()
            .find(|(_, identity)| identity.id == id)
            .map(|(_, identity)| identity.clone())
    }
}
