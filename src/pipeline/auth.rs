//! Stages 13 and 14: the authentication gate and optional identity
//! resolution.
//!
//! # Responsibilities
//! - Dispatch `POST /api/login` and `POST /api/logout` straight to the
//!   authenticator, bypassing generic routing
//! - Resolve the session token to an identity when one is present
//!
//! # Design Decisions
//! - Identity resolution never terminates the request: absence or an
//!   invalid token just leaves the request anonymous, and the matched
//!   route handler decides whether that is acceptable

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;

use crate::auth::Authenticator;
use crate::http::request::Request;
use crate::pipeline::{Context, Outcome, Stage};

pub const LOGIN_PATH: &str = "/api/login";
pub const LOGOUT_PATH: &str = "/api/logout";

pub struct AuthGate {
    authenticator: Arc<dyn Authenticator>,
}

impl AuthGate {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }
}

#[async_trait]
impl Stage for AuthGate {
    fn name(&self) -> &'static str {
        "auth_gate"
    }

    async fn apply(&self, req: &mut Request, _cx: &Context) -> Outcome {
        if req.method() != Method::POST {
            return Outcome::Continue;
        }
        let result = match req.path() {
            LOGIN_PATH => self.authenticator.login(req).await,
            LOGOUT_PATH => self.authenticator.logout(req).await,
            _ => return Outcome::Continue,
        };
        match result {
            Ok(res) => Outcome::Respond(res),
            Err(err) => Outcome::Fail(err),
        }
    }
}

pub struct IdentityResolver {
    authenticator: Arc<dyn Authenticator>,
    cookie_name: String,
}

impl IdentityResolver {
    pub fn new(authenticator: Arc<dyn Authenticator>, cookie_name: String) -> Self {
        Self {
            authenticator,
            cookie_name,
        }
    }

    /// Session cookie first, then a bearer header.
    fn token_from(&self, req: &Request) -> Option<String> {
        if let Some(token) = req.cookie(&self.cookie_name) {
            return Some(token.to_string());
        }
        req.header("authorization")
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
    }
}

#[async_trait]
impl Stage for IdentityResolver {
    fn name(&self) -> &'static str {
        "identity"
    }

    async fn apply(&self, req: &mut Request, cx: &Context) -> Outcome {
        let Some(token) = self.token_from(req) else {
            return Outcome::Continue;
        };
        match self.authenticator.identify(&token).await {
            Some(identity) => {
                tracing::debug!(
                    request_id = %cx.request_id,
                    user = %identity.id,
                    "identity resolved"
                );
                req.set_identity(identity);
            }
            None => {
                tracing::debug!(request_id = %cx.request_id, "session token declined");
            }
        }
        Outcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use crate::error::AppError;
    use crate::http::response::Response;
    use serde_json::json;

    struct FixedAuthenticator;

    #[async_trait]
    impl Authenticator for FixedAuthenticator {
        async fn login(&self, _req: &Request) -> Result<Response, AppError> {
            Ok(Response::json(json!({ "status": "success" })))
        }

        async fn logout(&self, _req: &Request) -> Result<Response, AppError> {
            Ok(Response::json(json!({ "status": "success" })))
        }

        async fn identify(&self, token: &str) -> Option<Identity> {
            (token == "valid").then(|| Identity {
                id: "user-1".to_string(),
                name: "Leo".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn login_path_short_circuits() {
        let gate = AuthGate::new(Arc::new(FixedAuthenticator));
        let mut req = Request::test(Method::POST, LOGIN_PATH);
        assert!(matches!(
            gate.apply(&mut req, &Context::new()).await,
            Outcome::Respond(_)
        ));
    }

    #[tokio::test]
    async fn get_on_login_path_falls_through() {
        let gate = AuthGate::new(Arc::new(FixedAuthenticator));
        let mut req = Request::test(Method::GET, LOGIN_PATH);
        assert!(matches!(
            gate.apply(&mut req, &Context::new()).await,
            Outcome::Continue
        ));
    }

    #[tokio::test]
    async fn valid_cookie_attaches_identity() {
        let resolver = IdentityResolver::new(Arc::new(FixedAuthenticator), "jwt".to_string());
        let mut req = Request::test(Method::GET, "/api/v1/tours");
        req.set_cookies([("jwt".to_string(), "valid".to_string())].into());

        resolver.apply(&mut req, &Context::new()).await;
        assert_eq!(req.identity().unwrap().id, "user-1");
    }

    #[tokio::test]
    async fn bearer_header_is_a_fallback() {
        let resolver = IdentityResolver::new(Arc::new(FixedAuthenticator), "jwt".to_string());
        let mut req = Request::test(Method::GET, "/api/v1/tours");
        req.headers_mut()
            .insert("authorization", "Bearer valid".parse().unwrap());

        resolver.apply(&mut req, &Context::new()).await;
        assert!(req.identity().is_some());
    }

    #[tokio::test]
    async fn invalid_tokens_stay_anonymous_without_failing() {
        let resolver = IdentityResolver::new(Arc::new(FixedAuthenticator), "jwt".to_string());
        let mut req = Request::test(Method::GET, "/api/v1/tours");
        req.set_cookies([("jwt".to_string(), "garbage".to_string())].into());

        let outcome = resolver.apply(&mut req, &Context::new()).await;
        assert!(matches!(outcome, Outcome::Continue));
        assert!(req.identity().is_none());
    }
}
