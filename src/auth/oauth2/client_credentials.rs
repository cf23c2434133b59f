//! OAuth2 Client Credentials grant (RFC 6749 §4.4)

use super::types::{ErrorResponse, TokenEnvelope, TokenResponse};
use super::Config;
use crate::auth::{basic_user_pass, Authenticator, AUTHORIZATION};
use crate::error::{Error, Result};
use crate::http::{Client, Unmarshaler};
use crate::types::Method;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::RwLock;
use serde::Deserialize;
use std::any::Any;
use std::fmt;
use tracing::{debug, info_span, Span};
use url::Url;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Where the client credentials travel in the token request.
///
/// A `Basic` authorization header is always sent (RFC 6749 §4.4.1);
/// `InBody` additionally repeats them as form fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthentication {
    #[default]
    InHeader,
    InBody,
}

/// Bearer authenticator backed by the client credentials grant.
///
/// The access token is cached and only requested again once expired. There
/// is no refresh token for this grant (RFC 6749 §4.4.3).
pub struct ClientCredentials {
    span: Span,
    http: Client,
    config: Config,
    client_auth: ClientAuthentication,
    token: RwLock<TokenResponse>,
    /// Serializes token requests so a burst of callers fetches once
    refresh: tokio::sync::Mutex<()>,
}

impl ClientCredentials {
    pub const NAME: &'static str = "oauth2.ClientCredentials";

    /// Create the authenticator.
    ///
    /// Without `http`, a client bound to `config.endpoint.url` with default
    /// options is created for token requests.
    pub fn new(
        client_auth: ClientAuthentication,
        config: Config,
        span: Option<Span>,
        http: Option<Client>,
    ) -> Result<Self> {
        let parent = span.unwrap_or_else(Span::current);
        let span = info_span!(parent: &parent, "oauth2");

        let http = match http {
            Some(http) => http,
            None => Client::builder(&config.endpoint.url)
                .span(span.clone())
                .build()?,
        };

        Ok(Self {
            span,
            http,
            config,
            client_auth,
            token: RwLock::new(TokenResponse::default()),
            refresh: tokio::sync::Mutex::new(()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client_auth(&self) -> ClientAuthentication {
        self.client_auth
    }

    /// Snapshot of the cached token
    pub fn token(&self) -> TokenResponse {
        self.token.read().clone()
    }

    /// Request a fresh access token from the token endpoint.
    ///
    /// The cached token is left untouched; [`Authenticator::update`] stores
    /// the result.
    pub async fn new_token(&self) -> Result<TokenResponse> {
        let endpoint = self.http.new_child(&self.config.endpoint.auth)?;

        // The serializer is not Send, keep it out of the awaits below
        let body = {
            let mut form = url::form_urlencoded::Serializer::new(String::new());
            form.append_pair("grant_type", "client_credentials");
            if !self.config.scopes.is_empty() {
                form.append_pair("scope", &self.config.scopes.join(" "));
            }
            if self.client_auth == ClientAuthentication::InBody {
                form.append_pair("client_id", &self.config.client_id);
                form.append_pair("client_secret", self.config.client_secret.expose());
            }
            Bytes::from(form.finish())
        };

        endpoint.set_header(
            AUTHORIZATION,
            format!(
                "Basic {}",
                basic_user_pass(&self.config.client_id, self.config.client_secret.expose())
            ),
        )?;
        endpoint.set_header(reqwest::header::CONTENT_TYPE.as_str(), FORM_CONTENT_TYPE)?;

        let result = endpoint.execute(Method::POST, Some(body), None).await;
        endpoint.close().await?;
        let response = result?;

        if response.status_code != 200 {
            let error = serde_json::from_slice::<ErrorResponse>(&response.body)
                .ok()
                .map(|e| e.error)
                .filter(|e| !e.is_empty());
            debug!(
                parent: &self.span,
                status = %response.status,
                error = ?error,
                "unexpected token endpoint response"
            );
            return Err(Error::UnexpectedStatusCode {
                status: response.status_code,
                error,
            });
        }

        if response.body.is_empty() {
            return Err(Error::EmptyBody);
        }

        let mut envelope = TokenEnvelope::default();
        envelope
            .unmarshal(response.status_code, &response.headers, &response.body)
            .map_err(|e| Error::InvalidTokenResponse {
                message: e.to_string(),
            })?;

        if envelope.token.token.is_empty() {
            debug!(parent: &self.span, unmarshaler = envelope.name(), "no token found in the response");
            return Err(Error::MissingToken);
        }

        Ok(envelope.token.issued_at(Utc::now()))
    }
}

#[async_trait]
impl Authenticator for ClientCredentials {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn update(&self) -> Result<()> {
        let expired = self.token.read().is_expired();
        if !expired {
            debug!(parent: &self.span, "access token is not expired");
            return Ok(());
        }

        let _refresh = self.refresh.lock().await;

        // Another caller may have refreshed while we waited
        let expired = self.token.read().is_expired();
        if !expired {
            return Ok(());
        }

        debug!(parent: &self.span, "requesting a new access token");
        let token = self.new_token().await?;
        *self.token.write() = token;

        Ok(())
    }

    fn header(&self, _method: &Method, _url: &Url, _body: &[u8]) -> Result<(String, String)> {
        let token = self.token.read();
        Ok((
            AUTHORIZATION.to_string(),
            format!("Bearer {}", token.token.expose()),
        ))
    }

    fn clone_box(&self) -> Box<dyn Authenticator> {
        let http = self
            .http
            .new_child("")
            .unwrap_or_else(|_| self.http.closed_copy());

        Box::new(Self {
            span: self.span.clone(),
            http,
            config: self.config.clone(),
            client_auth: self.client_auth,
            token: RwLock::new(self.token()),
            refresh: tokio::sync::Mutex::new(()),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("config", &self.config)
            .field("client_auth", &self.client_auth)
            .field("token", &*self.token.read())
            .finish_non_exhaustive()
    }
}
