//! HTTP server setup: the transport adapter in front of the pipeline.
//!
//! # Responsibilities
//! - Create the Axum router with a single any-route handler
//! - Collect each request into the pipeline-side model (body, client IP)
//! - Wire the transparent layers (tracing, response compression)
//! - Serve with graceful shutdown
//!
//! # Design Decisions
//! - Response compression is delegated to `CompressionLayer`; the pipeline
//!   never encodes bodies itself
//! - The transport body cap only guards memory; the 10 KB policy lives in
//!   the pipeline where it produces the uniform error shape

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request as AxumRequest},
    response::IntoResponse,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::http::request::Request;
use crate::pipeline::Pipeline;

/// Upper bound on buffered request bodies, far above any policy limit.
const TRANSPORT_BODY_CAP: usize = 1024 * 1024;

/// State injected into the any-route handler.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
    trust_proxy: bool,
}

/// HTTP server for the front door.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(pipeline: Arc<Pipeline>, config: &AppConfig) -> Self {
        let state = AppState {
            pipeline,
            trust_proxy: config.security.trust_proxy,
        };
        Self {
            router: Self::build_router(state),
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(pipeline_handler))
            .route("/", any(pipeline_handler))
            .with_state(state)
            .layer(CompressionLayer::new())
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Single entry point: every route becomes one pipeline pass.
async fn pipeline_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: AxumRequest<Body>,
) -> axum::response::Response {
    let (parts, body) = request.into_parts();

    let client_ip = client_ip(&parts.headers, addr, state.trust_proxy);
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let bytes = match axum::body::to_bytes(body, TRANSPORT_BODY_CAP).await {
        Ok(bytes) => bytes,
        Err(_) => {
            // The cap tripped before the pipeline could run; convert the
            // failure through the same terminal converter so API paths get
            // the JSON shape and browser paths the error page.
            let req = Request::new(
                parts.method,
                &path_and_query,
                parts.headers,
                Bytes::new(),
                client_ip,
                false,
            );
            return state
                .pipeline
                .convert_error(AppError::PayloadTooLarge, &req)
                .into_axum()
                .into_response();
        }
    };

    let req = Request::new(
        parts.method,
        &path_and_query,
        parts.headers,
        bytes,
        client_ip,
        false,
    );
    state.pipeline.handle(req).await.into_axum().into_response()
}

/// Client IP: first `X-Forwarded-For` hop when the proxy is trusted,
/// otherwise the socket peer.
fn client_ip(headers: &HeaderMap, peer: SocketAddr, trust_proxy: bool) -> IpAddr {
    if trust_proxy {
        if let Some(forwarded) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
        {
            if let Some(first) = forwarded.split(',').next() {
                if let Ok(ip) = first.trim().parse() {
                    return ip;
                }
            }
        }
    }
    peer.ip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn headers_with(forwarded: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", forwarded.parse().unwrap());
        headers
    }

    const PEER: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 40000);

    #[test]
    fn trusted_proxy_uses_the_first_forwarded_hop() {
        let headers = headers_with("203.0.113.9, 10.0.0.1");
        assert_eq!(
            client_ip(&headers, PEER, true),
            "203.0.113.9".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn untrusted_proxy_uses_the_peer() {
        let headers = headers_with("203.0.113.9");
        assert_eq!(client_ip(&headers, PEER, false), PEER.ip());
    }

    #[test]
    fn malformed_forwarded_headers_fall_back_to_the_peer() {
        let headers = headers_with("not-an-ip");
        assert_eq!(client_ip(&headers, PEER, true), PEER.ip());
    }
}
