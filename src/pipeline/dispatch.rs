//! Stages 15 and 17: router dispatch and the terminal not-found.
//!
//! The first mounted group whose prefix matches the path is offered the
//! request; a group may decline, letting the request fall through to later
//! groups and finally to the catch-all 404.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AppError;
use crate::http::request::Request;
use crate::pipeline::{Context, Outcome, Stage};
use crate::routes::RouteGroup;

pub struct RouterDispatch {
    groups: Vec<Arc<dyn RouteGroup>>,
}

impl RouterDispatch {
    pub fn new(groups: Vec<Arc<dyn RouteGroup>>) -> Self {
        Self { groups }
    }
}

#[async_trait]
impl Stage for RouterDispatch {
    fn name(&self) -> &'static str {
        "router"
    }

    async fn apply(&self, req: &mut Request, cx: &Context) -> Outcome {
        for group in &self.groups {
            if !req.path().starts_with(group.prefix()) {
                continue;
            }
            tracing::trace!(
                request_id = %cx.request_id,
                prefix = group.prefix(),
                "route group matched"
            );
            match group.handle(req).await {
                Ok(Some(res)) => return Outcome::Respond(res),
                Ok(None) => continue,
                Err(err) => return Outcome::Fail(err),
            }
        }
        Outcome::Continue
    }
}

/// Terminal stage: anything still unhandled is a 404.
pub struct NotFound;

#[async_trait]
impl Stage for NotFound {
    fn name(&self) -> &'static str {
        "not_found"
    }

    async fn apply(&self, req: &mut Request, _cx: &Context) -> Outcome {
        Outcome::Fail(AppError::not_found(req.original_url()))
    }
}
