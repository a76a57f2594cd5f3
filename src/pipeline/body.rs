//! Stages 6 and 7: the payment-webhook exception path and the generic
//! body parser.
//!
//! # Responsibilities
//! - Hand the webhook path its exact raw payload bytes, capped but never
//!   parsed, because signature verification happens over the bytes as sent
//! - Parse JSON and URL-encoded bodies for everything else, rejecting
//!   oversized or malformed payloads before any handler runs
//!
//! # Design Decisions
//! - The webhook gate sits before the parser so the raw bytes can never be
//!   consumed by it, and terminates the pipeline with the handler's own
//!   response

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;

use crate::error::AppError;
use crate::http::request::{Body, Request};
use crate::pipeline::{Context, Outcome, Stage};
use crate::routes::WebhookHandler;

/// Path carrying the payment provider's checkout events.
pub const WEBHOOK_PATH: &str = "/webhook-checkout";

pub struct WebhookGate {
    limit: usize,
    handler: Arc<dyn WebhookHandler>,
}

impl WebhookGate {
    pub fn new(limit: usize, handler: Arc<dyn WebhookHandler>) -> Self {
        Self { limit, handler }
    }
}

#[async_trait]
impl Stage for WebhookGate {
    fn name(&self) -> &'static str {
        "webhook_gate"
    }

    async fn apply(&self, req: &mut Request, _cx: &Context) -> Outcome {
        if req.method() != Method::POST || req.path() != WEBHOOK_PATH {
            return Outcome::Continue;
        }

        let payload = match req.body() {
            Body::Raw(bytes) => bytes.clone(),
            Body::Empty => bytes::Bytes::new(),
            // Nothing upstream parses bodies; anything else is a bug.
            _ => return Outcome::Fail(AppError::internal("webhook body already parsed")),
        };
        if payload.len() > self.limit {
            return Outcome::Fail(AppError::PayloadTooLarge);
        }

        match self.handler.handle(&payload, req).await {
            Ok(res) => Outcome::Respond(res),
            Err(err) => Outcome::Fail(err),
        }
    }
}

pub struct BodyParser {
    limit: usize,
}

impl BodyParser {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

#[async_trait]
impl Stage for BodyParser {
    fn name(&self) -> &'static str {
        "body_parser"
    }

    async fn apply(&self, req: &mut Request, _cx: &Context) -> Outcome {
        let Body::Raw(bytes) = req.body() else {
            return Outcome::Continue;
        };
        if bytes.len() > self.limit {
            return Outcome::Fail(AppError::PayloadTooLarge);
        }

        let content_type = req
            .header("content-type")
            .unwrap_or("")
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match content_type.as_str() {
            "application/json" => match serde_json::from_slice(bytes) {
                Ok(value) => {
                    req.set_body(Body::Json(value));
                    Outcome::Continue
                }
                Err(_) => Outcome::Fail(AppError::bad_request("invalid JSON body")),
            },
            "application/x-www-form-urlencoded" => {
                let pairs = url::form_urlencoded::parse(bytes).into_owned().collect();
                req.set_body(Body::Form(pairs));
                Outcome::Continue
            }
            // Unknown content types stay raw for whatever handler wants them.
            _ => Outcome::Continue,
        }
    }
}
