//! OAuth 2.0 authentication
//!
//! Only the Client Credentials grant (RFC 6749 §4.4) is implemented: the
//! client authenticates as itself, without an end user.

mod client_credentials;
mod types;

pub use client_credentials::{ClientAuthentication, ClientCredentials};
pub use types::{ErrorResponse, TokenEnvelope, TokenResponse};

use crate::secret::Secret;
use serde::Deserialize;

/// OAuth2 client registration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub client_id: String,
    pub client_secret: Secret,
    /// Requested scopes, sent space separated
    #[serde(default)]
    pub scopes: Vec<String>,
    pub endpoint: Endpoint,
}

/// Provider endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Endpoint {
    /// Base URL of the provider
    pub url: String,
    /// Token path, relative to `url`
    #[serde(default)]
    pub auth: String,
    /// Refresh path, relative to `url`. Unused by the client credentials grant.
    #[serde(default)]
    pub refresh: String,
}
