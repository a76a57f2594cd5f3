//! Stage 1: CORS gate.
//!
//! Attaches cross-origin headers to every response and short-circuits
//! `OPTIONS` preflights with an empty success, before any routing happens.

use async_trait::async_trait;
use axum::http::{Method, StatusCode};

use crate::config::CorsConfig;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::pipeline::{Context, Outcome, Stage};

const ALLOW_METHODS: &str = "GET,HEAD,PUT,PATCH,POST,DELETE";

pub struct CorsStage {
    allow_origin: String,
    max_age: String,
}

impl CorsStage {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            allow_origin: config.allow_origin.clone(),
            max_age: config.max_age_secs.to_string(),
        }
    }
}

#[async_trait]
impl Stage for CorsStage {
    fn name(&self) -> &'static str {
        "cors"
    }

    async fn apply(&self, req: &mut Request, _cx: &Context) -> Outcome {
        if req.method() != Method::OPTIONS {
            return Outcome::Continue;
        }

        let mut res = Response::empty().with_status(StatusCode::NO_CONTENT);
        res.insert_header("access-control-allow-methods", ALLOW_METHODS);
        let requested = req
            .header("access-control-request-headers")
            .unwrap_or("content-type,authorization");
        res.insert_header("access-control-allow-headers", requested);
        res.insert_header("access-control-max-age", &self.max_age);
        Outcome::Respond(res)
    }

    fn finalize(&self, _req: &Request, res: &mut Response, _cx: &Context) {
        res.insert_header("access-control-allow-origin", &self.allow_origin);
        if self.allow_origin != "*" {
            res.insert_header("vary", "Origin");
        }
    }
}
