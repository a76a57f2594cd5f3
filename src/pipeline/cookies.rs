//! Stage 8: cookie parsing.
//!
//! Splits the raw `Cookie` header into a name-to-value map on the request.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::http::request::Request;
use crate::pipeline::{Context, Outcome, Stage};

pub struct CookieParser;

/// Parse a `Cookie` header value. Malformed segments are skipped, later
/// duplicates win.
pub fn parse_cookie_header(raw: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for segment in raw.split(';') {
        if let Some((name, value)) = segment.split_once('=') {
            let name = name.trim();
            if !name.is_empty() {
                cookies.insert(name.to_string(), value.trim().to_string());
            }
        }
    }
    cookies
}

#[async_trait]
impl Stage for CookieParser {
    fn name(&self) -> &'static str {
        "cookie_parser"
    }

    async fn apply(&self, req: &mut Request, _cx: &Context) -> Outcome {
        if let Some(raw) = req.header("cookie") {
            let cookies = parse_cookie_header(raw);
            req.set_cookies(cookies);
        }
        Outcome::Continue
    }
}
