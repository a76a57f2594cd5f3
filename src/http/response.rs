//! Pipeline-side response model.
//!
//! # Responsibilities
//! - Hold status, headers, and body until the transport adapter writes them
//! - Provide constructors for the body shapes handlers actually produce
//!
//! # Design Decisions
//! - The body is written exactly once, by whichever stage or handler
//!   terminates the pipeline; `finalize` hooks may only touch headers

use axum::body::Body as AxumBody;
use axum::http::header::{HeaderName, HeaderValue, CONTENT_TYPE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;

/// An outbound HTTP response.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// Empty `200 OK`.
    pub fn empty() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// `200 OK` with a JSON body.
    pub fn json(value: serde_json::Value) -> Self {
        let mut res = Self::empty();
        res.body = Bytes::from(value.to_string());
        res.insert_header(CONTENT_TYPE.as_str(), "application/json");
        res
    }

    /// `200 OK` with an HTML body.
    pub fn html(page: impl Into<String>) -> Self {
        let mut res = Self::empty();
        res.body = Bytes::from(page.into());
        res.insert_header(CONTENT_TYPE.as_str(), "text/html; charset=utf-8");
        res
    }

    /// `200 OK` with a plain-text body.
    pub fn text(body: impl Into<String>) -> Self {
        let mut res = Self::empty();
        res.body = Bytes::from(body.into());
        res.insert_header(CONTENT_TYPE.as_str(), "text/plain; charset=utf-8");
        res
    }

    /// `200 OK` with raw bytes and an explicit content type.
    pub fn bytes(body: Bytes, content_type: &str) -> Self {
        let mut res = Self::empty();
        res.body = body;
        res.insert_header(CONTENT_TYPE.as_str(), content_type);
        res
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.insert_header(name, value);
        self
    }

    /// Insert a header, replacing any existing value. Invalid names or
    /// values are dropped rather than panicking mid-response.
    pub fn insert_header(&mut self, name: &str, value: &str) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name),
            HeaderValue::try_from(value),
        ) {
            self.headers.insert(name, value);
        }
    }

    /// Append a `Set-Cookie` header (cookies must not replace each other).
    pub fn add_cookie(&mut self, value: &str) {
        if let Ok(value) = HeaderValue::try_from(value) {
            self.headers.append(SET_COOKIE, value);
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Convert into the transport representation.
    pub fn into_axum(self) -> axum::response::Response {
        let mut builder = axum::http::Response::builder().status(self.status);
        if let Some(headers) = builder.headers_mut() {
            *headers = self.headers;
        }
        builder
            .body(AxumBody::from(self.body))
            .unwrap_or_else(|_| {
                axum::http::Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(AxumBody::empty())
                    .expect("static fallback response")
            })
    }
}
