//! Remote registry client configuration.

use serde::{Deserialize, Serialize};

/// Settings for talking to the remote identity registry and for the
/// permission links handed to affiliates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Member API base URL, e.g. `https://api.orcid.org`.
    pub api_base_url: String,
    /// API version path segment.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// OAuth token endpoint used for token exchange and client credentials.
    pub token_endpoint: String,
    /// Member client id.
    pub client_id: String,
    /// Member client secret.
    pub client_secret: String,
    /// Per-request timeout in seconds. A timed out call is recorded as a
    /// code 0 error and retried on the next sweep.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Landing page the affiliate visits to grant permission.
    pub landing_page_url: String,
    /// HMAC secret used to sign the `state` parameter of permission links.
    pub link_signing_secret: String,
    /// Validity of a permission link, in days.
    #[serde(default = "default_link_ttl_days")]
    pub link_ttl_days: i64,
}

fn default_api_version() -> String {
    "v3.0".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_link_ttl_days() -> i64 {
    90
}
