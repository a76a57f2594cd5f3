//! Pipeline-side request model.
//!
//! # Responsibilities
//! - Carry everything a stage may inspect: method, path, query, headers,
//!   body, cookies, client IP
//! - Hold the attachment slots stages write: secure flag, rate-limit info,
//!   authenticated identity
//!
//! # Design Decisions
//! - Mutated in place as it moves down the pipeline: a parsed body replaces
//!   the raw body, a sanitized body replaces the unsanitized one
//! - Query is kept as ordered pairs so repeated parameters survive until the
//!   parameter-pollution stage decides their fate

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::time::SystemTime;

use axum::http::{HeaderMap, Method};
use bytes::Bytes;

use crate::auth::Identity;
use crate::pipeline::rate_limit::RateLimitInfo;

/// Request body as seen by the current pipeline position.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    /// Unparsed payload bytes.
    Raw(Bytes),
    /// Parsed JSON document.
    Json(serde_json::Value),
    /// Parsed URL-encoded form pairs.
    Form(Vec<(String, String)>),
}

impl Body {
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Raw(bytes) => bytes.is_empty(),
            Body::Json(_) => false,
            Body::Form(pairs) => pairs.is_empty(),
        }
    }
}

/// An inbound HTTP request moving down the pipeline.
#[derive(Debug)]
pub struct Request {
    method: Method,
    /// Path plus query string, exactly as received. Used in the 404 message.
    original_url: String,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Body,
    cookies: HashMap<String, String>,
    client_ip: IpAddr,
    received_at: SystemTime,
    via_tls: bool,
    secure: bool,
    identity: Option<Identity>,
    rate_limit: Option<RateLimitInfo>,
}

impl Request {
    pub fn new(
        method: Method,
        path_and_query: &str,
        headers: HeaderMap,
        body: Bytes,
        client_ip: IpAddr,
        via_tls: bool,
    ) -> Self {
        let (path, raw_query) = match path_and_query.split_once('?') {
            Some((p, q)) => (p.to_string(), q),
            None => (path_and_query.to_string(), ""),
        };
        let query = url::form_urlencoded::parse(raw_query.as_bytes())
            .into_owned()
            .collect();
        let body = if body.is_empty() {
            Body::Empty
        } else {
            Body::Raw(body)
        };

        Self {
            method,
            original_url: path_and_query.to_string(),
            path,
            query,
            headers,
            body,
            cookies: HashMap::new(),
            client_ip,
            received_at: SystemTime::now(),
            via_tls,
            secure: false,
            identity: None,
            rate_limit: None,
        }
    }

    /// Synthetic request for driving the pipeline without a network, used by
    /// the test suites.
    pub fn test(method: Method, path_and_query: &str) -> Self {
        Self::new(
            method,
            path_and_query,
            HeaderMap::new(),
            Bytes::new(),
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            false,
        )
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Case-insensitive header lookup, value as UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn set_body(&mut self, body: Body) {
        self.body = body;
    }

    /// Last value for a query parameter, if present.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for a query parameter, in order of appearance.
    pub fn query_all(&self, key: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn query_pairs_mut(&mut self) -> &mut Vec<(String, String)> {
        &mut self.query
    }

    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn set_cookies(&mut self, cookies: HashMap<String, String>) {
        self.cookies = cookies;
    }

    pub fn client_ip(&self) -> IpAddr {
        self.client_ip
    }

    pub fn received_at(&self) -> SystemTime {
        self.received_at
    }

    /// Whether the connection itself was TLS-terminated here.
    pub fn via_tls(&self) -> bool {
        self.via_tls
    }

    /// Secure-transport classification computed by the pipeline.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn set_secure(&mut self, secure: bool) {
        self.secure = secure;
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    pub fn rate_limit(&self) -> Option<&RateLimitInfo> {
        self.rate_limit.as_ref()
    }

    pub fn set_rate_limit(&mut self, info: RateLimitInfo) {
        self.rate_limit = Some(info);
    }
}
