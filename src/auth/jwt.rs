//! HS256 session-token codec.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::Identity;
use crate::config::AuthConfig;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token rejected: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// User id.
    sub: String,
    /// Display name.
    name: String,
    iat: u64,
    exp: u64,
}

/// Issues and verifies the HS256 tokens carried in the session cookie.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation: Validation::default(),
            ttl_secs: config.token_ttl_secs,
        }
    }

    /// Issue a token for a verified identity.
    pub fn issue(&self, identity: &Identity) -> Result<String, TokenError> {
        let now = unix_now();
        let claims = Claims {
            sub: identity.id.clone(),
            name: identity.name.clone(),
            iat: now,
            exp: now + self.ttl_secs,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    /// Verify a token and recover the identity baked into its claims.
    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(Identity {
            id: data.claims.sub,
            name: data.claims.name,
        })
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(ttl_secs: u64) -> TokenCodec {
        let mut config = AuthConfig::default();
        config.jwt_secret = "test-secret".to_string();
        config.token_ttl_secs = ttl_secs;
        TokenCodec::new(&config)
    }

    fn identity() -> Identity {
        Identity {
            id: "user-1".to_string(),
            name: "Leo".to_string(),
        }
    }

    #[test]
    fn round_trips_identity() {
        let codec = codec(3600);
        let token = codec.issue(&identity()).unwrap();
        assert_eq!(codec.verify(&token).unwrap(), identity());
    }

    #[test]
    fn rejects_tampered_tokens() {
        let codec = codec(3600);
        let mut token = codec.issue(&identity()).unwrap();
        // Flip a character in the signature segment.
        let flipped = if token.ends_with('a') { 'b' } else { 'a' };
        token.pop();
        token.push(flipped);
        assert!(codec.verify(&token).is_err());
    }

    #[test]
    fn rejects_foreign_secrets() {
        let token = codec(3600).issue(&identity()).unwrap();
        let mut other_config = AuthConfig::default();
        other_config.jwt_secret = "different-secret".to_string();
        let other = TokenCodec::new(&other_config);
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn rejects_expired_tokens() {
        // Issue a token already past its exp (ttl 0, default 60s leeway
        // disabled by a strict validation).
        let mut config = AuthConfig::default();
        config.jwt_secret = "test-secret".to_string();
        config.token_ttl_secs = 0;
        let mut codec = TokenCodec::new(&config);
        codec.validation.leeway = 0;

        let token = codec.issue(&identity()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert!(codec.verify(&token).is_err());
    }
}
