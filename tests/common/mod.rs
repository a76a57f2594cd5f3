//! Shared fixtures for the integration suites.

// Not every suite uses every fixture.
#![allow(dead_code)]

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{HeaderMap, Method};
use bytes::Bytes;

use outfitter::auth::{Identity, MemoryCredentials, SessionAuthenticator, TokenCodec};
use outfitter::config::{AppConfig, Environment};
use outfitter::error::AppError;
use outfitter::http::request::Request;
use outfitter::http::response::Response;
use outfitter::pipeline::rate_limit::{Clock, RateLimitStore};
use outfitter::pipeline::Pipeline;
use outfitter::routes::{RouteGroup, WebhookHandler};

/// Manually-driven clock so rate-limit windows elapse without sleeping.
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self(AtomicU64::new(start))
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Route group that records how often it was reached and echoes request
/// facts handlers care about (identity, secure flag, query).
pub struct RecordingGroup {
    prefix: &'static str,
    pub hits: AtomicUsize,
}

impl RecordingGroup {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            hits: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RouteGroup for RecordingGroup {
    fn prefix(&self) -> &str {
        self.prefix
    }

    async fn handle(&self, req: &Request) -> Result<Option<Response>, AppError> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        let body = match req.body() {
            outfitter::http::request::Body::Json(value) => value.clone(),
            _ => serde_json::Value::Null,
        };
        Ok(Some(Response::json(serde_json::json!({
            "status": "success",
            "prefix": self.prefix,
            "identity": req.identity().map(|i| i.id.clone()),
            "secure": req.is_secure(),
            "query": req
                .query_pairs()
                .iter()
                .map(|(k, v)| serde_json::json!([k, v]))
                .collect::<Vec<_>>(),
            "body": body,
        }))))
    }
}

/// Webhook handler capturing the exact bytes it was handed.
#[derive(Default)]
pub struct CaptureWebhook {
    pub payloads: Mutex<Vec<Vec<u8>>>,
}

#[async_trait]
impl WebhookHandler for CaptureWebhook {
    async fn handle(&self, payload: &[u8], _req: &Request) -> Result<Response, AppError> {
        self.payloads.lock().unwrap().push(payload.to_vec());
        Ok(Response::json(serde_json::json!({ "received": true })))
    }
}

/// Base config for tests: development off, no static dir, known secret.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.environment = Environment::Production;
    config.assets.public_dir = String::new();
    config.auth.jwt_secret = "integration-test-secret".to_string();
    config
}

/// Credential store seeded with one known account.
pub fn seeded_credentials() -> Arc<MemoryCredentials> {
    let store = Arc::new(MemoryCredentials::new());
    store.insert(
        "leo@example.com",
        "pass1234",
        Identity {
            id: "user-1".to_string(),
            name: "Leo".to_string(),
        },
    );
    store
}

pub struct TestHarness {
    pub pipeline: Arc<Pipeline>,
    pub clock: Arc<ManualClock>,
    pub api_group: Arc<RecordingGroup>,
    pub view_group: Arc<RecordingGroup>,
    pub webhook: Arc<CaptureWebhook>,
}

/// Assemble a full pipeline around fakes, driven without a network.
pub fn harness(config: AppConfig) -> TestHarness {
    let config = Arc::new(config);
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let store = Arc::new(RateLimitStore::new(
        config.rate_limit.clone(),
        clock.clone(),
    ));
    let api_group = Arc::new(RecordingGroup::new("/api/v1/tours"));
    let view_group = Arc::new(RecordingGroup::new("/"));
    let webhook = Arc::new(CaptureWebhook::default());
    let authenticator = Arc::new(SessionAuthenticator::new(
        TokenCodec::new(&config.auth),
        seeded_credentials(),
        config.auth.cookie_name.clone(),
    ));

    let pipeline = Arc::new(
        Pipeline::builder(config)
            .rate_limit_store(store)
            .authenticator(authenticator)
            .webhook_handler(webhook.clone())
            .route_group(api_group.clone())
            .route_group(view_group.clone())
            .build(),
    );

    TestHarness {
        pipeline,
        clock,
        api_group,
        view_group,
        webhook,
    }
}

/// Synthetic request with headers and a body.
pub fn request(method: Method, path: &str, headers: &[(&str, &str)], body: &[u8]) -> Request {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.insert(
            axum::http::header::HeaderName::try_from(*name).unwrap(),
            value.parse().unwrap(),
        );
    }
    Request::new(
        method,
        path,
        map,
        Bytes::copy_from_slice(body),
        IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
        false,
    )
}
