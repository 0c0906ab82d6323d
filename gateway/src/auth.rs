//! Issues and verifies the bearer tokens that protect the repositories
//! endpoint.

use crate::config::{JwtConfig, LoginConfig};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

const BEARER_PREFIX: &str = "Bearer ";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum AuthError {
    #[error("token has expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("could not sign token: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Username the token was issued to
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs tokens for the configured account and verifies them on later
/// requests.
pub struct TokenAuthority {
    credentials: LoginConfig,
    expiration: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenAuthority {
    pub fn new(credentials: LoginConfig, jwt: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        TokenAuthority {
            credentials,
            expiration: Duration::seconds(jwt.expiration_secs as i64),
            encoding_key: EncodingKey::from_secret(jwt.signing_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt.signing_key.as_bytes()),
            validation,
        }
    }

    pub fn check_credentials(&self, username: &str, password: &str) -> bool {
        username == self.credentials.username && password == self.credentials.password
    }

    pub fn issue(&self, username: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: username.to_string(),
            iat: now.timestamp(),
            exp: (now + self.expiration).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid(e.to_string()),
            })
    }

    /// Verifies the value of an `Authorization` header, which must be
    /// exactly `Bearer <token>`.
    pub fn verify_header(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        let token = header
            .and_then(|h| h.strip_prefix(BEARER_PREFIX))
            .ok_or_else(|| AuthError::Invalid("missing bearer token".into()))?;
        self.verify(token)
    }
}
