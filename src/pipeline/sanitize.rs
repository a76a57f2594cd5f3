//! Stage 9: injection sanitization.
//!
//! # Responsibilities
//! - Strip `$` and `.` from body and query keys so user input can never
//!   smuggle query-language operators into a store lookup
//! - Escape `<` and `>` in string values so script-like content renders
//!   inert
//!
//! # Design Decisions
//! - Escaping only the angle brackets (to `&lt;`/`&gt;`) keeps the
//!   transformation idempotent: sanitized output contains neither character,
//!   so a second pass changes nothing

use async_trait::async_trait;
use serde_json::Value;

use crate::http::request::{Body, Request};
use crate::pipeline::{Context, Outcome, Stage};

pub struct Sanitizer;

/// Remove query-operator characters from a key.
pub fn sanitize_key(key: &str) -> String {
    key.chars().filter(|c| *c != '$' && *c != '.').collect()
}

/// Escape script-delimiting characters in a value.
pub fn sanitize_value(value: &str) -> String {
    if !value.contains(['<', '>']) {
        return value.to_string();
    }
    value
        .chars()
        .map(|c| match c {
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            other => other.to_string(),
        })
        .collect()
}

/// Sanitize a JSON document in place: keys lose operator characters,
/// string values are escaped, recursively.
pub fn sanitize_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let mut replacement = serde_json::Map::with_capacity(map.len());
            for (key, mut inner) in std::mem::take(map) {
                sanitize_json(&mut inner);
                replacement.insert(sanitize_key(&key), inner);
            }
            *map = replacement;
        }
        Value::Array(items) => {
            for item in items {
                sanitize_json(item);
            }
        }
        Value::String(s) => {
            *s = sanitize_value(s);
        }
        _ => {}
    }
}

fn sanitize_pairs(pairs: &mut Vec<(String, String)>) {
    for (key, value) in pairs.iter_mut() {
        *key = sanitize_key(key);
        *value = sanitize_value(value);
    }
}

#[async_trait]
impl Stage for Sanitizer {
    fn name(&self) -> &'static str {
        "sanitize"
    }

    async fn apply(&self, req: &mut Request, _cx: &Context) -> Outcome {
        match req.body_mut() {
            Body::Json(value) => sanitize_json(value),
            Body::Form(pairs) => sanitize_pairs(pairs),
            Body::Empty | Body::Raw(_) => {}
        }
        sanitize_pairs(req.query_pairs_mut());
        Outcome::Continue
    }
}
