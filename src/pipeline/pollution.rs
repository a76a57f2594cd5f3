//! Stage 10: parameter-pollution guard.
//!
//! Repeated query parameters collapse to their last value, except for the
//! filter/sort fields where repeated-array semantics are intentional.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::http::request::Request;
use crate::pipeline::{Context, Outcome, Stage};

/// Parameters allowed to appear multiple times.
const WHITELIST: &[&str] = &[
    "duration",
    "ratingsQuantity",
    "ratingsAverage",
    "maxGroupSize",
    "difficulty",
    "price",
];

pub struct PollutionGuard {
    whitelist: HashSet<&'static str>,
}

impl Default for PollutionGuard {
    fn default() -> Self {
        Self {
            whitelist: WHITELIST.iter().copied().collect(),
        }
    }
}

impl PollutionGuard {
    /// Collapse repeated non-whitelisted keys to their last occurrence,
    /// keeping first-seen ordering.
    fn collapse(&self, pairs: &[(String, String)]) -> Vec<(String, String)> {
        let mut result: Vec<(String, String)> = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            if self.whitelist.contains(key.as_str()) {
                result.push((key.clone(), value.clone()));
                continue;
            }
            match result.iter_mut().find(|(k, _)| k == key) {
                Some((_, existing)) => *existing = value.clone(),
                None => result.push((key.clone(), value.clone())),
            }
        }
        result
    }
}

#[async_trait]
impl Stage for PollutionGuard {
    fn name(&self) -> &'static str {
        "pollution_guard"
    }

    async fn apply(&self, req: &mut Request, _cx: &Context) -> Outcome {
        let pairs = req.query_pairs_mut();
        if !pairs.is_empty() {
            let collapsed = self.collapse(pairs);
            *pairs = collapsed;
        }
        Outcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[tokio::test]
    async fn repeated_parameters_collapse_to_the_last_value() {
        let mut req = Request::test(Method::GET, "/api/v1/tours?page=1&page=2");
        PollutionGuard::default()
            .apply(&mut req, &Context::new())
            .await;

        assert_eq!(req.query_all("page"), vec!["2"]);
        assert_eq!(req.query("page"), Some("2"));
    }

    #[tokio::test]
    async fn whitelisted_parameters_keep_array_semantics() {
        let mut req = Request::test(Method::GET, "/api/v1/tours?duration=5&duration=9&page=1&page=2");
        PollutionGuard::default()
            .apply(&mut req, &Context::new())
            .await;

        assert_eq!(req.query_all("duration"), vec!["5", "9"]);
        assert_eq!(req.query_all("page"), vec!["2"]);
    }

    #[tokio::test]
    async fn unrepeated_parameters_are_untouched() {
        let mut req = Request::test(Method::GET, "/api/v1/tours?sort=price&limit=10");
        PollutionGuard::default()
            .apply(&mut req, &Context::new())
            .await;

        assert_eq!(
            req.query_pairs(),
            &[
                ("sort".to_string(), "price".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
    }
}
