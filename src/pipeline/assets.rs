//! Stage 2: static-asset short-circuit.
//!
//! `GET`/`HEAD` requests whose path resolves to a file under the public
//! directory are served directly and terminate the pipeline; everything
//! else continues down the chain.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use axum::http::Method;
use bytes::Bytes;

use crate::config::AssetsConfig;
use crate::error::AppError;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::pipeline::{Context, Outcome, Stage};

pub struct StaticAssets {
    public_dir: PathBuf,
}

impl StaticAssets {
    pub fn new(config: &AssetsConfig) -> Self {
        Self {
            public_dir: PathBuf::from(&config.public_dir),
        }
    }

    /// Resolve a URL path to a file under the public directory, rejecting
    /// anything that steps outside it.
    fn resolve(&self, url_path: &str) -> Option<PathBuf> {
        let relative = url_path.trim_start_matches('/');
        if relative.is_empty() {
            return None;
        }
        let candidate = Path::new(relative);
        if candidate
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.public_dir.join(candidate))
    }
}

#[async_trait]
impl Stage for StaticAssets {
    fn name(&self) -> &'static str {
        "static_assets"
    }

    async fn apply(&self, req: &mut Request, _cx: &Context) -> Outcome {
        if req.method() != Method::GET && req.method() != Method::HEAD {
            return Outcome::Continue;
        }
        let Some(path) = self.resolve(req.path()) else {
            return Outcome::Continue;
        };

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            // Directories and special files fall through to the router.
            Ok(_) => return Outcome::Continue,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Outcome::Continue,
            Err(e) => {
                return Outcome::Fail(AppError::internal_with("failed to stat static asset", e))
            }
        }

        match tokio::fs::read(&path).await {
            Ok(contents) => {
                let body = if req.method() == Method::HEAD {
                    Bytes::new()
                } else {
                    Bytes::from(contents)
                };
                Outcome::Respond(Response::bytes(body, content_type_for(&path)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Outcome::Continue,
            Err(e) => Outcome::Fail(AppError::internal_with("failed to read static asset", e)),
        }
    }
}

/// Extension-derived content type for the asset kinds the front-end ships.
fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webmanifest") => "application/manifest+json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage_for(dir: &Path) -> StaticAssets {
        StaticAssets::new(&AssetsConfig {
            public_dir: dir.to_string_lossy().into_owned(),
        })
    }

    fn temp_public_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("outfitter-assets-{name}-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("css")).unwrap();
        std::fs::write(dir.join("css/style.css"), "body { margin: 0; }").unwrap();
        dir
    }

    #[tokio::test]
    async fn serves_existing_files() {
        let dir = temp_public_dir("serve");
        let stage = stage_for(&dir);
        let mut req = Request::test(Method::GET, "/css/style.css");

        match stage.apply(&mut req, &Context::new()).await {
            Outcome::Respond(res) => {
                assert_eq!(res.header("content-type"), Some("text/css; charset=utf-8"));
                assert_eq!(res.body(), b"body { margin: 0; }");
            }
            other => panic!("expected file response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_files_fall_through() {
        let dir = temp_public_dir("miss");
        let stage = stage_for(&dir);
        let mut req = Request::test(Method::GET, "/api/v1/tours");
        assert!(matches!(
            stage.apply(&mut req, &Context::new()).await,
            Outcome::Continue
        ));
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let dir = temp_public_dir("traverse");
        let stage = stage_for(&dir);
        let mut req = Request::test(Method::GET, "/../secrets.txt");
        assert!(matches!(
            stage.apply(&mut req, &Context::new()).await,
            Outcome::Continue
        ));
    }

    #[tokio::test]
    async fn post_requests_are_not_served() {
        let dir = temp_public_dir("post");
        let stage = stage_for(&dir);
        let mut req = Request::test(Method::POST, "/css/style.css");
        assert!(matches!(
            stage.apply(&mut req, &Context::new()).await,
            Outcome::Continue
        ));
    }
}
