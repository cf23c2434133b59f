//! OAuth2 token endpoint payloads (RFC 6749 §5.1 and §5.2)

use crate::http::Unmarshaler;
use crate::secret::Secret;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Deserializer};

/// Successful access token response (RFC 6749 §5.1)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(rename = "access_token", default)]
    pub token: Secret,
    #[serde(default)]
    pub token_type: String,
    /// Lifetime in seconds
    #[serde(default, deserialize_with = "seconds")]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Secret,
    #[serde(default)]
    pub scope: String,
    /// Absolute expiry, computed when the token is stored
    #[serde(skip)]
    pub expire_at: Option<DateTime<Utc>>,
}

impl TokenResponse {
    /// Stamp the absolute expiry as `now + expires_in`.
    ///
    /// A response without `expires_in` expires immediately. Lifetimes past
    /// the representable range saturate at the minimum or maximum instant.
    pub fn issued_at(mut self, now: DateTime<Utc>) -> Self {
        let seconds = self.expires_in.unwrap_or(0);
        let expire_at = TimeDelta::try_seconds(seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .unwrap_or(if seconds < 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            });
        self.expire_at = Some(expire_at);
        self
    }

    /// A token with no expiry stamp has never been issued
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expire_at {
            Some(expire_at) => expire_at <= now,
            None => true,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Error response (RFC 6749 §5.2)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_description: String,
    #[serde(default)]
    pub error_uri: String,
}

/// Either side of a token endpoint answer, decoded from the same body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenEnvelope {
    #[serde(flatten)]
    pub token: TokenResponse,
    #[serde(flatten)]
    pub error: ErrorResponse,
}

impl TokenEnvelope {
    pub const NAME: &'static str = "oauth2.Response";
}

impl Unmarshaler for TokenEnvelope {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn unmarshal(&mut self, _status: u16, _headers: &HeaderMap, body: &[u8]) -> anyhow::Result<()> {
        *self = serde_json::from_slice(body)?;
        Ok(())
    }
}

/// `expires_in` as a JSON number, or as a numeric string some servers send
fn seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
