//! Stage 12: secure-request classification.
//!
//! Computes whether the request arrived over secure transport, considering
//! the fronting proxy's forwarding header when it is trusted. Downstream
//! cookie writers consult the flag for the `Secure` attribute.

use async_trait::async_trait;

use crate::http::request::Request;
use crate::pipeline::{Context, Outcome, Stage};

pub struct SecureClassifier {
    trust_proxy: bool,
}

impl SecureClassifier {
    pub fn new(trust_proxy: bool) -> Self {
        Self { trust_proxy }
    }
}

#[async_trait]
impl Stage for SecureClassifier {
    fn name(&self) -> &'static str {
        "secure_classify"
    }

    async fn apply(&self, req: &mut Request, _cx: &Context) -> Outcome {
        let forwarded_https = self.trust_proxy
            && req
                .header("x-forwarded-proto")
                .map(|proto| {
                    proto
                        .split(',')
                        .next()
                        .unwrap_or("")
                        .trim()
                        .eq_ignore_ascii_case("https")
                })
                .unwrap_or(false);

        req.set_secure(req.via_tls() || forwarded_https);
        Outcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    async fn classify(trust_proxy: bool, proto: Option<&str>) -> bool {
        let mut req = Request::test(Method::GET, "/");
        if let Some(proto) = proto {
            req.headers_mut()
                .insert("x-forwarded-proto", proto.parse().unwrap());
        }
        SecureClassifier::new(trust_proxy)
            .apply(&mut req, &Context::new())
            .await;
        req.is_secure()
    }

    #[tokio::test]
    async fn trusted_forwarded_https_is_secure() {
        assert!(classify(true, Some("https")).await);
        assert!(classify(true, Some("HTTPS")).await);
        assert!(classify(true, Some("https, http")).await);
    }

    #[tokio::test]
    async fn untrusted_proxies_are_ignored() {
        assert!(!classify(false, Some("https")).await);
    }

    #[tokio::test]
    async fn plain_http_is_not_secure() {
        assert!(!classify(true, Some("http")).await);
        assert!(!classify(true, None).await);
    }
}
