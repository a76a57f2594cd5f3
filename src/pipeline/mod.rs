//! The ordered request pipeline.
//!
//! # Responsibilities
//! - Define the stage contract (`apply` continues, responds, or fails)
//! - Run stages in a fixed, deterministic order with short-circuit semantics
//! - Funnel every failure through the single terminal error converter
//!
//! # Design Decisions
//! - The chain is an explicit `Vec<Arc<dyn Stage>>` driven by one loop, so
//!   the order is visible in one place and each stage is testable alone
//! - `finalize` runs in reverse for every stage whose `apply` ran, and may
//!   only touch headers and logs; the body is written exactly once

pub mod access_log;
pub mod assets;
pub mod auth;
pub mod body;
pub mod classify;
pub mod cookies;
pub mod cors;
pub mod dispatch;
pub mod headers;
pub mod pollution;
pub mod rate_limit;
pub mod sanitize;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::{Authenticator, MemoryCredentials, SessionAuthenticator, TokenCodec};
use crate::config::AppConfig;
use crate::error::{AppError, ErrorConverter};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::observability::metrics;
use crate::routes::{RouteGroup, UnconfiguredWebhook, WebhookHandler};

use self::rate_limit::{RateLimitStore, SystemClock};

/// What a stage decided about the request.
#[derive(Debug)]
pub enum Outcome {
    /// Pass the request to the next stage.
    Continue,
    /// Terminate with this response; later stages never run.
    Respond(Response),
    /// Terminate through the error converter; later stages never run.
    Fail(AppError),
}

/// Per-request invariants available to every stage.
pub struct Context {
    pub request_id: Uuid,
    pub started_at: Instant,
}

impl Context {
    fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            started_at: Instant::now(),
        }
    }
}

/// One unit of the request pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stable name, used in logs and the order test.
    fn name(&self) -> &'static str;

    /// Inspect and possibly mutate the request.
    async fn apply(&self, req: &mut Request, cx: &Context) -> Outcome;

    /// Header/log-only hook, runs in reverse order for every stage whose
    /// `apply` ran, whatever the outcome was.
    fn finalize(&self, _req: &Request, _res: &mut Response, _cx: &Context) {}
}

/// The assembled pipeline.
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    converter: ErrorConverter,
}

impl Pipeline {
    pub fn builder(config: Arc<AppConfig>) -> PipelineBuilder {
        PipelineBuilder {
            config,
            rate_limit_store: None,
            authenticator: None,
            webhook: None,
            groups: Vec::new(),
        }
    }

    /// Drive one request through the chain and produce its response.
    pub async fn handle(&self, mut req: Request) -> Response {
        let cx = Context::new();
        let mut ran = 0;
        let mut terminal = None;

        for stage in &self.stages {
            ran += 1;
            match stage.apply(&mut req, &cx).await {
                Outcome::Continue => {}
                Outcome::Respond(res) => {
                    tracing::trace!(
                        request_id = %cx.request_id,
                        stage = stage.name(),
                        "stage responded"
                    );
                    terminal = Some(res);
                    break;
                }
                Outcome::Fail(err) => {
                    tracing::trace!(
                        request_id = %cx.request_id,
                        stage = stage.name(),
                        error = %err,
                        "stage failed"
                    );
                    terminal = Some(self.converter.convert(err, &req));
                    break;
                }
            }
        }

        // The terminal not-found stage means the loop cannot normally fall
        // through; this is the same conversion, kept as a safety net.
        let mut res = terminal.unwrap_or_else(|| {
            self.converter
                .convert(AppError::not_found(req.original_url()), &req)
        });

        for stage in self.stages[..ran].iter().rev() {
            stage.finalize(&req, &mut res, &cx);
        }

        res.insert_header("x-request-id", &cx.request_id.to_string());
        metrics::record_request(req.method().as_str(), res.status().as_u16(), cx.started_at);
        res
    }

    /// Convert a failure raised before the chain runs (in the transport
    /// layer) through the same terminal converter.
    pub fn convert_error(&self, err: AppError, req: &Request) -> Response {
        self.converter.convert(err, req)
    }

    /// Installed stage names, in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

/// Assembles the fixed stage order from configuration and collaborators.
pub struct PipelineBuilder {
    config: Arc<AppConfig>,
    rate_limit_store: Option<Arc<RateLimitStore>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    webhook: Option<Arc<dyn WebhookHandler>>,
    groups: Vec<Arc<dyn RouteGroup>>,
}

impl PipelineBuilder {
    /// Inject a rate-limit store (tests supply one with a manual clock).
    pub fn rate_limit_store(mut self, store: Arc<RateLimitStore>) -> Self {
        self.rate_limit_store = Some(store);
        self
    }

    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn webhook_handler(mut self, webhook: Arc<dyn WebhookHandler>) -> Self {
        self.webhook = Some(webhook);
        self
    }

    /// Mount a route group. Groups are consulted in registration order.
    pub fn route_group(mut self, group: Arc<dyn RouteGroup>) -> Self {
        self.groups.push(group);
        self
    }

    pub fn build(self) -> Pipeline {
        let config = self.config;

        let store = self.rate_limit_store.unwrap_or_else(|| {
            Arc::new(RateLimitStore::new(
                config.rate_limit.clone(),
                Arc::new(SystemClock),
            ))
        });
        let authenticator: Arc<dyn Authenticator> = self.authenticator.unwrap_or_else(|| {
            Arc::new(SessionAuthenticator::new(
                TokenCodec::new(&config.auth),
                Arc::new(MemoryCredentials::new()),
                config.auth.cookie_name.clone(),
            ))
        });
        let webhook: Arc<dyn WebhookHandler> =
            self.webhook.unwrap_or_else(|| Arc::new(UnconfiguredWebhook));

        let mut stages: Vec<Arc<dyn Stage>> = Vec::new();
        stages.push(Arc::new(cors::CorsStage::new(&config.cors)));
        if !config.assets.public_dir.is_empty() {
            stages.push(Arc::new(assets::StaticAssets::new(&config.assets)));
        }
        stages.push(Arc::new(headers::SecurityHeaders::new()));
        if config.environment.is_development() {
            stages.push(Arc::new(access_log::AccessLog));
        }
        stages.push(Arc::new(rate_limit::RateLimit::new(
            config.rate_limit.prefix.clone(),
            store,
        )));
        stages.push(Arc::new(body::WebhookGate::new(
            config.limits.body_limit_bytes,
            webhook,
        )));
        stages.push(Arc::new(body::BodyParser::new(
            config.limits.body_limit_bytes,
        )));
        stages.push(Arc::new(cookies::CookieParser));
        stages.push(Arc::new(sanitize::Sanitizer));
        stages.push(Arc::new(pollution::PollutionGuard::default()));
        stages.push(Arc::new(classify::SecureClassifier::new(
            config.security.trust_proxy,
        )));
        stages.push(Arc::new(auth::AuthGate::new(authenticator.clone())));
        stages.push(Arc::new(auth::IdentityResolver::new(
            authenticator,
            config.auth.cookie_name.clone(),
        )));
        stages.push(Arc::new(dispatch::RouterDispatch::new(self.groups)));
        stages.push(Arc::new(dispatch::NotFound));

        Pipeline {
            stages,
            converter: ErrorConverter::new(config.environment),
        }
    }
}
