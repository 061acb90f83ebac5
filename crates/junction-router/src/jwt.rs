//! HS256 bearer-token decoding
//!
//! The default [`TokenDecoder`] implementation. Signing and key management
//! stay outside the core; this only verifies and extracts claims.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use tracing::debug;

use junction_core::{ApiError, ApiResult, ErrorKind, UserSession};

use crate::session_resolver::TokenDecoder;

/// HMAC-SHA256 token decoder
pub struct Hs256Decoder {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256Decoder {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Override claim validation rules (audience, expiry leeway, ...)
    pub fn with_validation(secret: &[u8], validation: Validation) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

#[async_trait]
impl TokenDecoder for Hs256Decoder {
    async fn decode(&self, token: &str) -> ApiResult<UserSession> {
        let data = jsonwebtoken::decode::<Map<String, Value>>(token, &self.key, &self.validation)
            .map_err(|err| {
                // decode detail stays server-side; the client sees the
                // registry's invalid-session message
                debug!("bearer token rejected: {}", err);
                ApiError::new(ErrorKind::InvalidSession)
            })?;
        Ok(UserSession::from_claims(data.claims))
    }
}
