//! Signed permission links.
//!
//! A permission link is the configured landing page URL with a signed
//! `state` parameter naming the affiliate email and the organization. The
//! landing page verifies the state before starting the registry's OAuth
//! flow.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use assertion_core::config::RegistryConfig;
use assertion_core::error::AppError;

/// Claims carried in the `state` parameter of a permission link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkClaims {
    /// Affiliate email.
    pub sub: String,
    /// Organization asking for permission.
    pub org: String,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
}

/// Creates and verifies permission links.
#[derive(Clone)]
pub struct LinkSigner {
    /// HMAC key for signing.
    encoding_key: EncodingKey,
    /// HMAC key for verification.
    decoding_key: DecodingKey,
    /// Validation configuration.
    validation: Validation,
    /// Landing page the link points at.
    landing_page_url: String,
    /// Link validity.
    ttl: Duration,
}

impl std::fmt::Debug for LinkSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSigner")
            .field("landing_page_url", &self.landing_page_url)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl LinkSigner {
    /// Creates a signer from the registry configuration.
    ///
    /// Fails when no signing secret is configured.
    pub fn new(config: &RegistryConfig) -> Result<Self, AppError> {
        if config.link_signing_secret.trim().is_empty() {
            return Err(AppError::configuration(
                "registry.link_signing_secret must be set",
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 5;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.link_signing_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.link_signing_secret.as_bytes()),
            validation,
            landing_page_url: config.landing_page_url.clone(),
            ttl: Duration::days(config.link_ttl_days),
        })
    }

    /// Build the permission link for `email` at `org_id`.
    pub fn link(&self, email: &str, org_id: &str, now: DateTime<Utc>) -> Result<String, AppError> {
        let claims = LinkClaims {
            sub: email.to_string(),
            org: org_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let state = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to sign permission link: {e}")))?;

        let separator = if self.landing_page_url.contains('?') { '&' } else { '?' };
        Ok(format!("{}{separator}state={state}", self.landing_page_url))
    }

    /// Verify a `state` parameter and return its claims.
    pub fn verify(&self, state: &str) -> Result<LinkClaims, AppError> {
        let data = decode::<LinkClaims>(state, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::authorization("Permission link has expired")
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AppError::authorization("Invalid permission link signature")
                }
                _ => AppError::authorization(format!("Invalid permission link: {e}")),
            },
        )?;
        Ok(data.claims)
    }
}
