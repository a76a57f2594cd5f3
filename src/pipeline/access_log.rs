//! Stage 4: conditional access logging.
//!
//! Installed only in development mode; logs method, path, status and
//! latency for each request once its response exists.

use async_trait::async_trait;

use crate::http::request::Request;
use crate::http::response::Response;
use crate::pipeline::{Context, Outcome, Stage};

pub struct AccessLog;

#[async_trait]
impl Stage for AccessLog {
    fn name(&self) -> &'static str {
        "access_log"
    }

    async fn apply(&self, _req: &mut Request, _cx: &Context) -> Outcome {
        Outcome::Continue
    }

    fn finalize(&self, req: &Request, res: &mut Response, cx: &Context) {
        tracing::info!(
            request_id = %cx.request_id,
            method = %req.method(),
            path = %req.path(),
            status = res.status().as_u16(),
            latency_ms = cx.started_at.elapsed().as_millis() as u64,
            "request handled"
        );
    }
}
