//! Client settings files
//!
//! A settings document describes one client: base URL, default headers and
//! query, options and the authentication strategy. It is read from YAML or
//! JSON and turned into a ready [`Client`].
//!
//! ```yaml
//! base_url: https://api.example.com/v1
//! headers:
//!   Accept: application/json
//! options:
//!   max_redirect: 5
//!   timeout: 10s
//! auth:
//!   type: basic
//!   user_id: alice
//!   secret: s3cr3t
//! ```

use crate::auth::oauth2::{ClientAuthentication, ClientCredentials, Config, Endpoint};
use crate::auth::{Authenticator, Basic, Digest, DigestParameters};
use crate::error::{Error, Result};
use crate::http::{
    Client, Options, RateLimiterConfig, TokenBucket, DEFAULT_MAX_REDIRECT, DEFAULT_TIMEOUT,
};
use crate::secret::Secret;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Span};

// ============================================================================
// Settings Document
// ============================================================================

/// Complete client settings loaded from YAML or JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSettings {
    /// Base URL of every request
    pub base_url: String,

    /// Default headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Default query parameters, a single value or a list per key
    #[serde(default)]
    pub query: BTreeMap<String, QueryValue>,

    #[serde(default)]
    pub options: OptionsSettings,

    #[serde(default)]
    pub auth: AuthSettings,
}

/// One query value or several values for the same key
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    One(String),
    Many(Vec<String>),
}

impl QueryValue {
    pub fn values(&self) -> &[String] {
        match self {
            QueryValue::One(value) => std::slice::from_ref(value),
            QueryValue::Many(values) => values,
        }
    }
}

/// Untyped [`Options`]: limits are signed here and validated on conversion
#[derive(Debug, Clone, Deserialize)]
pub struct OptionsSettings {
    #[serde(default = "default_true")]
    pub only_https: bool,

    #[serde(default = "default_true")]
    pub follow: bool,

    #[serde(default)]
    pub follow_auth: bool,

    #[serde(default = "default_true")]
    pub follow_referer: bool,

    #[serde(default = "default_max_redirect")]
    pub max_redirect: i64,

    /// Seconds, or a duration string such as `500ms`, `35s`, `2m`, `1h`
    #[serde(default)]
    pub timeout: Option<TimeoutSetting>,

    #[serde(default)]
    pub disable_tls_verify: bool,

    #[serde(default)]
    pub rate_limit: Option<RateLimiterConfig>,
}

impl Default for OptionsSettings {
    fn default() -> Self {
        Self {
            only_https: true,
            follow: true,
            follow_auth: false,
            follow_referer: true,
            max_redirect: default_max_redirect(),
            timeout: None,
            disable_tls_verify: false,
            rate_limit: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_redirect() -> i64 {
    DEFAULT_MAX_REDIRECT as i64
}

/// Timeout as written in a settings file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TimeoutSetting {
    Seconds(f64),
    Text(String),
}

impl TimeoutSetting {
    pub fn to_duration(&self) -> Result<Duration> {
        match self {
            TimeoutSetting::Seconds(secs) => seconds(*secs, &secs.to_string()),
            TimeoutSetting::Text(text) => parse_duration(text),
        }
    }
}

/// Authentication strategy, tagged by `type`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthSettings {
    #[default]
    None,

    Basic {
        user_id: String,
        secret: Secret,
    },

    Digest {
        username: String,
        secret: Secret,
        #[serde(default)]
        parameters: DigestParameters,
    },

    Oauth2ClientCredentials {
        client_id: String,
        client_secret: Secret,
        #[serde(default)]
        scopes: Vec<String>,
        endpoint: Endpoint,
        /// `in_header` (default) or `in_body`
        #[serde(default)]
        client_auth: ClientAuthentication,
    },
}

// ============================================================================
// Loading
// ============================================================================

/// Load settings from a `.yaml`, `.yml` or `.json` file.
///
/// Files with another extension are parsed as JSON when they start with
/// `{`, as YAML otherwise.
pub fn load_settings(path: impl AsRef<Path>) -> Result<ClientSettings> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read settings file '{}': {}",
            path.display(),
            e
        ))
    })?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let settings: ClientSettings = match extension.as_deref() {
        Some("json") => serde_json::from_str(&content)?,
        Some("yaml" | "yml") => serde_yaml::from_str(&content)?,
        _ if content.trim_start().starts_with('{') => serde_json::from_str(&content)?,
        _ => serde_yaml::from_str(&content)?,
    };

    validate_settings(&settings)?;
    Ok(settings)
}

/// Load settings from a YAML string. JSON, being YAML, is accepted too.
pub fn load_settings_from_str(text: &str) -> Result<ClientSettings> {
    let settings: ClientSettings = serde_yaml::from_str(text)?;
    validate_settings(&settings)?;
    Ok(settings)
}

/// Check what the typed [`Options`] cannot express
fn validate_settings(settings: &ClientSettings) -> Result<()> {
    if settings.base_url.trim().is_empty() {
        return Err(Error::EmptyServerUrl);
    }

    settings.options.to_options()?;

    if let Some(rate) = &settings.options.rate_limit {
        if rate.requests_per_second == 0 {
            return Err(Error::config("rate_limit.requests_per_second must be > 0"));
        }
    }

    Ok(())
}

// ============================================================================
// Conversion
// ============================================================================

impl OptionsSettings {
    /// Convert to [`Options`], rejecting negative limits
    pub fn to_options(&self) -> Result<Options> {
        if self.max_redirect < 0 {
            return Err(Error::InvalidRedirectLimit {
                value: self.max_redirect,
            });
        }

        let timeout = match &self.timeout {
            Some(timeout) => timeout.to_duration()?,
            None => DEFAULT_TIMEOUT,
        };

        let mut builder = Options::builder()
            .only_https(self.only_https)
            .follow(self.follow)
            .follow_auth(self.follow_auth)
            .follow_referer(self.follow_referer)
            .max_redirect(self.max_redirect as usize)
            .timeout(timeout)
            .disable_tls_verify(self.disable_tls_verify);

        if let Some(rate) = &self.rate_limit {
            builder = builder.rate_limiter(Arc::new(TokenBucket::new(rate)));
        }

        Ok(builder.build())
    }
}

impl AuthSettings {
    /// Build the authenticator. OAuth2 token requests use `options`.
    pub fn authenticator(
        &self,
        options: &Options,
        span: &Span,
        parent: Option<&CancellationToken>,
    ) -> Result<Option<Box<dyn Authenticator>>> {
        let auth: Box<dyn Authenticator> = match self {
            AuthSettings::None => return Ok(None),
            AuthSettings::Basic { user_id, secret } => {
                Box::new(Basic::new(user_id.as_str(), secret.clone())?)
            }
            AuthSettings::Digest {
                username,
                secret,
                parameters,
            } => Box::new(Digest::new(
                username.as_str(),
                secret.clone(),
                parameters.clone(),
            )?),
            AuthSettings::Oauth2ClientCredentials {
                client_id,
                client_secret,
                scopes,
                endpoint,
                client_auth,
            } => {
                let mut http = Client::builder(&endpoint.url)
                    .options(options.clone())
                    .span(span.clone());
                if let Some(parent) = parent {
                    http = http.parent(parent);
                }

                let config = Config {
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    scopes: scopes.clone(),
                    endpoint: endpoint.clone(),
                };
                Box::new(ClientCredentials::new(
                    *client_auth,
                    config,
                    Some(span.clone()),
                    Some(http.build()?),
                )?)
            }
        };

        Ok(Some(auth))
    }
}

impl ClientSettings {
    /// Build a client from the settings. With `parent`, cancelling that
    /// token closes the client.
    pub fn build_client(&self, parent: Option<&CancellationToken>) -> Result<Client> {
        validate_settings(self)?;

        let options = self.options.to_options()?;
        let span = info_span!("http_client", base_url = %self.base_url);

        let mut builder = Client::builder(&self.base_url)
            .options(options.clone())
            .span(span.clone());
        if let Some(parent) = parent {
            builder = builder.parent(parent);
        }
        if let Some(auth) = self.auth.authenticator(&options, &span, parent)? {
            builder = builder.authenticator(auth);
        }

        let client = builder.build()?;

        for (name, value) in &self.headers {
            client.append_header(name, value)?;
        }
        for (key, value) in &self.query {
            for value in value.values() {
                client.append_query(key.as_str(), value.as_str());
            }
        }

        debug!(
            parent: client.span(),
            url = %client.url(),
            headers = self.headers.len(),
            query = self.query.len(),
            "client built from settings"
        );

        Ok(client)
    }
}

// ============================================================================
// Durations
// ============================================================================

/// Parse `500ms`, `1.5s`, `2m`, `1h` or a bare number of seconds
pub fn parse_duration(text: &str) -> Result<Duration> {
    let text = text.trim();
    let split = text
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);

    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| invalid_timeout(format!("cannot parse '{text}'")))?;

    let scale = match unit {
        "" | "s" => 1.0,
        "ms" => 0.001,
        "m" => 60.0,
        "h" => 3600.0,
        other => return Err(invalid_timeout(format!("unknown unit '{other}' in '{text}'"))),
    };

    seconds(value * scale, text)
}

fn seconds(secs: f64, text: &str) -> Result<Duration> {
    if !secs.is_finite() {
        return Err(invalid_timeout(format!("'{text}' is not a finite duration")));
    }
    if secs < 0.0 {
        return Err(invalid_timeout(format!("must be >= 0, got '{text}'")));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| invalid_timeout(e.to_string()))
}

fn invalid_timeout(message: impl Into<String>) -> Error {
    Error::InvalidTimeout {
        message: message.into(),
    }
}
