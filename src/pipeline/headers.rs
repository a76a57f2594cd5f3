//! Stage 3: security-header injection.
//!
//! Attaches a fixed content-security-policy restricting scripts, styles,
//! fonts and frames to our own origin plus the maps and payments providers,
//! together with the companion hardening headers. The header set is fixed,
//! never per-request.

use async_trait::async_trait;

use crate::http::request::Request;
use crate::http::response::Response;
use crate::pipeline::{Context, Outcome, Stage};

/// Per-directive allow-lists. Anything not listed is denied by `default-src`.
const CSP_DIRECTIVES: &[(&str, &[&str])] = &[
    ("default-src", &["'self'"]),
    ("script-src", &["'self'", "api.mapbox.com", "js.stripe.com"]),
    ("worker-src", &["'self'", "blob:"]),
    ("object-src", &["'none'"]),
    ("font-src", &["'self'", "fonts.gstatic.com"]),
    ("style-src", &["'self'", "api.mapbox.com", "fonts.googleapis.com"]),
    ("img-src", &["'self'", "data:"]),
    ("frame-src", &["'self'", "js.stripe.com"]),
    (
        "connect-src",
        &["'self'", "api.mapbox.com", "events.mapbox.com", "ws:"],
    ),
];

pub struct SecurityHeaders {
    csp: String,
}

impl SecurityHeaders {
    pub fn new() -> Self {
        let mut directives: Vec<String> = CSP_DIRECTIVES
            .iter()
            .map(|(name, sources)| format!("{} {}", name, sources.join(" ")))
            .collect();
        directives.push("upgrade-insecure-requests".to_string());
        Self {
            csp: directives.join("; "),
        }
    }
}

impl Default for SecurityHeaders {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for SecurityHeaders {
    fn name(&self) -> &'static str {
        "security_headers"
    }

    async fn apply(&self, _req: &mut Request, _cx: &Context) -> Outcome {
        Outcome::Continue
    }

    fn finalize(&self, _req: &Request, res: &mut Response, _cx: &Context) {
        res.insert_header("content-security-policy", &self.csp);
        res.insert_header("x-content-type-options", "nosniff");
        res.insert_header("x-frame-options", "SAMEORIGIN");
        res.insert_header("x-xss-protection", "0");
        res.insert_header(
            "strict-transport-security",
            "max-age=15552000; includeSubDomains",
        );
        res.insert_header("x-dns-prefetch-control", "off");
        res.insert_header("referrer-policy", "no-referrer");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[test]
    fn csp_allows_the_named_providers() {
        let stage = SecurityHeaders::new();
        let req = Request::test(Method::GET, "/");
        let mut res = Response::empty();
        stage.finalize(&req, &mut res, &Context::new());

        let csp = res.header("content-security-policy").unwrap();
        assert!(csp.contains("default-src 'self'"));
        assert!(csp.contains("script-src 'self' api.mapbox.com js.stripe.com"));
        assert!(csp.contains("frame-src 'self' js.stripe.com"));
        assert!(csp.contains("connect-src 'self' api.mapbox.com events.mapbox.com ws:"));
        assert!(csp.contains("object-src 'none'"));
        assert!(csp.ends_with("upgrade-insecure-requests"));
    }

    #[test]
    fn companion_headers_are_attached() {
        let stage = SecurityHeaders::new();
        let req = Request::test(Method::GET, "/");
        let mut res = Response::empty();
        stage.finalize(&req, &mut res, &Context::new());

        assert_eq!(res.header("x-content-type-options"), Some("nosniff"));
        assert_eq!(res.header("x-frame-options"), Some("SAMEORIGIN"));
        assert!(res.header("strict-transport-security").is_some());
    }
}
