//! Binary entry point: configuration, logging, pipeline wiring, serve.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use tokio::net::TcpListener;

use outfitter::auth::{Identity, MemoryCredentials, SessionAuthenticator, TokenCodec};
use outfitter::config::{load_config, validate_config, AppConfig};
use outfitter::error::AppError;
use outfitter::http::request::Request;
use outfitter::http::response::Response;
use outfitter::routes::WebhookHandler;
use outfitter::{HttpServer, Pipeline, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "outfitter", about = "Hardened HTTP front door for a tour-booking platform")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Stand-in webhook handler until the bookings service registers its own:
/// acknowledges receipt so the payments provider stops retrying.
struct AckWebhook;

#[async_trait]
impl WebhookHandler for AckWebhook {
    async fn handle(&self, payload: &[u8], _req: &Request) -> Result<Response, AppError> {
        tracing::info!(bytes = payload.len(), "checkout webhook received");
        Ok(Response::json(serde_json::json!({ "received": true })))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            let config = AppConfig::default();
            validate_config(&config)?;
            config
        }
    };

    outfitter::observability::logging::init(
        config.environment,
        config.observability.log_filter.as_deref(),
    );

    tracing::info!(
        environment = ?config.environment,
        bind_address = %config.listener.bind_address,
        rate_limit = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => outfitter::observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let credentials = Arc::new(MemoryCredentials::new());
    if config.environment.is_development() {
        // Local-only account so the login flow works out of the box.
        credentials.insert(
            "dev@example.com",
            "pass1234",
            Identity {
                id: "dev-user".to_string(),
                name: "Developer".to_string(),
            },
        );
    }
    let authenticator = Arc::new(SessionAuthenticator::new(
        TokenCodec::new(&config.auth),
        credentials,
        config.auth.cookie_name.clone(),
    ));

    let config = Arc::new(config);
    let pipeline = Arc::new(
        Pipeline::builder(config.clone())
            .authenticator(authenticator)
            .webhook_handler(Arc::new(AckWebhook))
            .build(),
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.trigger();
        }
    });

    let server = HttpServer::new(pipeline, &config);
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
