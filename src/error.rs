//! Application error taxonomy and the terminal error conversion.
//!
//! # Responsibilities
//! - Define the single error type every pipeline stage and route group fails with
//! - Convert any failure into the uniform wire shape exactly once
//! - Suppress internal detail outside development mode
//!
//! # Design Decisions
//! - Operational errors (deliberately raised: bad input, rate limit, auth,
//!   not-found) keep their message in production; everything else collapses
//!   to a generic message
//! - API paths (`/api/...`) receive JSON bodies, browser paths a rendered
//!   error page, both with identical status/message semantics

use axum::http::StatusCode;
use serde_json::json;
use thiserror::Error;

use crate::config::Environment;
use crate::http::request::Request;
use crate::http::response::Response;

/// Error raised by pipeline stages and route groups.
#[derive(Debug, Error)]
pub enum AppError {
    /// Client sent a malformed or otherwise invalid request.
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    /// The request did not match any route.
    #[error("Can't find {0} on this server")]
    NotFound(String),

    /// Body exceeded the configured size limit.
    #[error("request entity too large")]
    PayloadTooLarge,

    /// Per-IP request budget exhausted for the current window.
    #[error("Too many requests from this IP address, please try again later")]
    TooManyRequests,

    /// Unexpected failure; message is hidden outside development mode.
    #[error("{message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(original_url: impl Into<String>) -> Self {
        Self::NotFound(original_url.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    pub fn internal_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error was raised deliberately by application logic.
    pub fn is_operational(&self) -> bool {
        !matches!(self, Self::Internal { .. })
    }

    /// `fail` for client-class statuses, `error` otherwise.
    pub fn status_label(&self) -> &'static str {
        if self.status_code().is_client_error() {
            "fail"
        } else {
            "error"
        }
    }
}

/// Message shown for non-operational errors outside development mode.
const GENERIC_MESSAGE: &str = "Something went very wrong!";

/// Terminal conversion of an [`AppError`] into a wire response.
///
/// Every `Outcome::Fail` in the pipeline funnels through here; nothing else
/// writes error bodies.
pub struct ErrorConverter {
    environment: Environment,
}

impl ErrorConverter {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }

    pub fn convert(&self, err: AppError, req: &Request) -> Response {
        let status = err.status_code();

        if status.is_server_error() {
            tracing::error!(
                status = status.as_u16(),
                path = %req.path(),
                error = %err,
                "request failed"
            );
        } else {
            tracing::debug!(
                status = status.as_u16(),
                path = %req.path(),
                error = %err,
                "request rejected"
            );
        }

        let message = self.public_message(&err);
        if req.path().starts_with("/api") {
            self.json_body(status, &err, message)
        } else {
            self.error_page(status, message)
        }
    }

    fn public_message(&self, err: &AppError) -> String {
        if err.is_operational() || self.environment.is_development() {
            err.to_string()
        } else {
            GENERIC_MESSAGE.to_string()
        }
    }

    fn json_body(&self, status: StatusCode, err: &AppError, message: String) -> Response {
        let body = if self.environment.is_development() {
            json!({
                "status": err.status_label(),
                "message": message,
                "detail": format!("{err:?}"),
            })
        } else {
            json!({
                "status": err.status_label(),
                "message": message,
            })
        };
        Response::json(body).with_status(status)
    }

    fn error_page(&self, status: StatusCode, message: String) -> Response {
        let page = format!(
            "<!DOCTYPE html>\n<html>\n<head><title>Something went wrong</title></head>\n\
             <body>\n<h1>{}</h1>\n<p>{}</p>\n</body>\n</html>\n",
            status.as_u16(),
            message
        );
        Response::html(page).with_status(status)
    }
}
