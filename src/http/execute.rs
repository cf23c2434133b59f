//! Request execution
//!
//! Every call runs on a private snapshot of the client taken with
//! [`Client::try_clone`], so concurrent calls never observe each other's
//! header or query changes. Only the in-flight counter and the error
//! history of the calling client are updated.

use super::client::{encode_query, ActiveRequest, Client, Shared};
use super::codec::{Marshaler, Unmarshaler};
use super::options::Options;
use super::redirect::{Hop, RedirectAction, RedirectPolicy, RedirectRequest};
use super::types::{status_line, Response};
use crate::error::{Error, Result};
use crate::types::Method;
use bytes::Bytes;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, LOCATION, REFERER};
use reqwest::StatusCode;
use std::time::Instant;
use tracing::{debug, info, warn, Span};
use url::Url;

const DEFAULT_CONTENT_TYPE: &str = "application/json";

impl Client {
    /// Execute a request against the client URL.
    ///
    /// `method` must be one of the [`Method`] names. When `unmarshaler` is
    /// given and the response has a body, it decodes the body; its failure
    /// fails the call.
    pub async fn execute(
        &self,
        method: impl AsRef<str>,
        body: Option<Bytes>,
        unmarshaler: Option<&mut dyn Unmarshaler>,
    ) -> Result<Response> {
        self.execute_inner(method.as_ref(), body, None, unmarshaler)
            .await
    }

    /// Like [`Client::execute`], with the body produced by `marshaler` and
    /// `Content-Type` taken from it.
    pub async fn execute_with_marshal(
        &self,
        method: impl AsRef<str>,
        marshaler: Option<&dyn Marshaler>,
        unmarshaler: Option<&mut dyn Unmarshaler>,
    ) -> Result<Response> {
        let Some(marshaler) = marshaler else {
            return self.execute(method, None, unmarshaler).await;
        };

        let body = marshaler.marshal().map_err(|source| Error::Marshal {
            marshaler: marshaler.name().to_string(),
            source,
        })?;

        self.execute_inner(
            method.as_ref(),
            Some(Bytes::from(body)),
            Some(marshaler.content_type()),
            unmarshaler,
        )
        .await
    }

    async fn execute_inner(
        &self,
        method: &str,
        body: Option<Bytes>,
        content_type: Option<&str>,
        unmarshaler: Option<&mut dyn Unmarshaler>,
    ) -> Result<Response> {
        if self.is_closed() {
            return Err(Error::ClientClosed);
        }

        let _active = ActiveRequest::new(&self.shared);
        let method: Method = method.parse()?;

        self.refresh_auth().await?;

        let snapshot = self.try_clone()?;
        if let Some(content_type) = content_type {
            snapshot.set_header(CONTENT_TYPE.as_str(), content_type)?;
        }

        let result = snapshot
            .perform(method, body, unmarshaler, &self.shared)
            .await;
        snapshot.close().await?;

        result
    }

    /// Let the authenticator of this client refresh its credentials, so the
    /// refreshed state is kept beyond the per-call snapshot
    async fn refresh_auth(&self) -> Result<()> {
        let auth = self.shared.config.read().auth.clone();
        if let Some(auth) = auth {
            auth.update().await?;
        }
        Ok(())
    }

    /// Send the request described by this snapshot and follow redirects.
    /// Outcomes are recorded in `origin`, the client the call was made on.
    async fn perform(
        &self,
        method: Method,
        body: Option<Bytes>,
        unmarshaler: Option<&mut dyn Unmarshaler>,
        origin: &Shared,
    ) -> Result<Response> {
        let span = &self.shared.span;
        let cancel = &self.shared.cancel;

        let (base, url, mut headers, options, auth) = {
            let config = self.shared.config.read();
            let mut url = config.url.clone();
            if !config.query.is_empty() {
                debug!(parent: span, query = ?config.query, "encoding query parameters");
                url.set_query(Some(&encode_query(&config.query)));
            }
            (
                config.url.clone(),
                url,
                config.headers.clone(),
                config.options.clone(),
                config.auth.clone(),
            )
        };

        if let Some(body) = &body {
            if !headers.contains_key(CONTENT_TYPE) {
                debug!(
                    parent: span,
                    content_type = DEFAULT_CONTENT_TYPE,
                    body_size = body.len(),
                    "setting the default content type"
                );
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
            }
        }

        if let Some(auth) = &auth {
            debug!(parent: span, auth_name = auth.name(), "adding authentication header");
            let (name, value) = auth.header(&method, &url, body.as_deref().unwrap_or_default())?;
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::invalid_header(&name, e))?;
            let header_value =
                HeaderValue::from_str(&value).map_err(|e| Error::invalid_header(&name, e))?;
            headers.insert(header_name, header_value);
        }

        let transport = transport(&options, &url, span)?;
        let policy = RedirectPolicy::new(&options, &base, cancel, span);

        debug!(
            parent: span,
            method = %method,
            url = %url,
            headers = ?headers.keys().collect::<Vec<_>>(),
            "executing HTTP request"
        );

        let start = Instant::now();

        if let Some(limiter) = &options.rate_limiter {
            limiter.wait(cancel).await?;
        }

        let mut trace = Vec::new();
        let mut via: Vec<Hop> = Vec::new();
        let mut current = RedirectRequest { url, headers };
        let mut hop_method = method;
        let mut hop_body = body;

        let response = loop {
            let mut request = transport
                .request(hop_method.into(), current.url.clone())
                .headers(current.headers.clone());
            if let Some(body) = &hop_body {
                request = request.body(body.clone());
            }

            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                response = request.send() => response?,
            };

            let Some(target) = redirect_target(&response) else {
                break response;
            };

            let status = response.status();
            via.push(Hop {
                url: current.url.clone(),
                status: status_line(status),
            });

            let mut next = RedirectRequest {
                url: target,
                headers: current.headers.clone(),
            };

            if matches!(
                status,
                StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER
            ) {
                if hop_method != Method::HEAD {
                    hop_method = Method::GET;
                }
                hop_body = None;
                next.headers.remove(CONTENT_TYPE);
                next.headers.remove(CONTENT_LENGTH);
            }

            match referer(&current.url, &next.url) {
                Some(value) => {
                    next.headers.insert(REFERER, value);
                }
                None => {
                    next.headers.remove(REFERER);
                }
            }

            match policy.check(&mut next, &via, Some(&mut trace)).await? {
                RedirectAction::UseLastResponse => break response,
                RedirectAction::Follow => current = next,
            }
        };

        let status = response.status();
        let status_text = status_line(status);
        let response_time = start.elapsed();
        let error_rate = origin.errors.lock().record(base.as_str(), status.as_u16());

        let mut result = Response {
            success: status.as_u16() < 400,
            status_code: status.as_u16(),
            status: status_text,
            proto: format!("{:?}", response.version()),
            headers: response.headers().clone(),
            body: Bytes::new(),
            response_time,
            redirect_trace: trace,
            error_rate,
            url: response.url().clone(),
        };

        info!(
            parent: span,
            success = result.success,
            method = %method,
            path = %base.path(),
            status = %result.status,
            trace = result.redirect_trace.len(),
            response_time = ?result.response_time,
            error_rate = result.error_rate,
            "HTTP request"
        );

        let content_length = response.content_length();
        if content_length == Some(0) {
            debug!(parent: span, "empty response body received");
            return Ok(result);
        }
        debug!(
            parent: span,
            status_code = result.status_code,
            content_length = ?content_length,
            "reading response body"
        );

        result.body = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            body = response.bytes() => body.map_err(Error::request_failed)?,
        };

        if let Some(unmarshaler) = unmarshaler {
            debug!(
                parent: span,
                unmarshaler = unmarshaler.name(),
                body_size = result.body.len(),
                "unmarshaling response body"
            );
            unmarshaler
                .unmarshal(result.status_code, &result.headers, &result.body)
                .map_err(Error::request_failed)?;
        }

        Ok(result)
    }
}

/// Per-call transport. Redirects are never followed by the transport itself.
fn transport(options: &Options, url: &Url, span: &Span) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(concat!("herald-http/", env!("CARGO_PKG_VERSION")));

    if !options.timeout.is_zero() {
        builder = builder.timeout(options.timeout);
    }

    if options.disable_tls_verify {
        warn!(
            parent: span,
            host = url.host_str().unwrap_or_default(),
            proto = "http/1.1",
            "TLS verification disabled, insecure connection"
        );
        builder = builder.danger_accept_invalid_certs(true).http1_only();
    }

    Ok(builder.build()?)
}

/// Target of a redirect response, resolved against the response URL
fn redirect_target(response: &reqwest::Response) -> Option<Url> {
    if !matches!(
        response.status(),
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    ) {
        return None;
    }

    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    response.url().join(location).ok()
}

/// `Referer` for a hop from `from` to `to`, never sent on an https -> http
/// downgrade
fn referer(from: &Url, to: &Url) -> Option<HeaderValue> {
    if from.scheme() == "https" && to.scheme() == "http" {
        return None;
    }

    let mut referer = from.clone();
    referer.set_fragment(None);
    let _ = referer.set_username("");
    let _ = referer.set_password(None);
    HeaderValue::from_str(referer.as_str()).ok()
}
