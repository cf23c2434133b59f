//! Redirect policy
//!
//! The executor never lets the transport follow redirects. For every
//! candidate hop it asks [`RedirectPolicy::check`], which may rewrite the
//! next request, records the hop in the trace and decides whether to go on.

use super::options::Options;
use super::types::RedirectTrace;
use crate::error::{Error, Result};
use chrono::Utc;
use reqwest::header::{HeaderMap, AUTHORIZATION, REFERER};
use tokio_util::sync::CancellationToken;
use tracing::{debug, Span};
use url::Url;

/// The request about to be sent to the redirect target
#[derive(Debug, Clone)]
pub struct RedirectRequest {
    pub url: Url,
    pub headers: HeaderMap,
}

/// A request already sent in this chain, with the status it got
#[derive(Debug, Clone)]
pub struct Hop {
    pub url: Url,
    pub status: String,
}

/// Decision for a candidate redirect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectAction {
    /// Send the rewritten request
    Follow,
    /// Stop and hand the redirect response to the caller
    UseLastResponse,
}

/// Redirect rules of one client, evaluated once per candidate hop
pub struct RedirectPolicy<'a> {
    options: &'a Options,
    origin: &'a Url,
    cancel: &'a CancellationToken,
    span: &'a Span,
}

impl<'a> RedirectPolicy<'a> {
    /// `origin` is the client URL, used to detect cross-host hops
    pub fn new(
        options: &'a Options,
        origin: &'a Url,
        cancel: &'a CancellationToken,
        span: &'a Span,
    ) -> Self {
        Self {
            options,
            origin,
            cancel,
            span,
        }
    }

    /// Evaluate a candidate hop.
    ///
    /// `via` holds every request sent so far in the chain, oldest first, so
    /// it is never empty when a redirect is being considered.
    pub async fn check(
        &self,
        req: &mut RedirectRequest,
        via: &[Hop],
        trace: Option<&mut Vec<RedirectTrace>>,
    ) -> Result<RedirectAction> {
        if !self.options.follow {
            return Ok(RedirectAction::UseLastResponse);
        }

        let Some(trace) = trace else {
            return Err(Error::NoTrace);
        };

        if !self.options.follow_referer {
            req.headers.remove(REFERER);
        }

        if !same_authority(&req.url, self.origin) && !self.options.follow_auth {
            req.headers.remove(AUTHORIZATION);
        }

        let (from, status) = via
            .last()
            .map(|hop| (hop.url.to_string(), hop.status.clone()))
            .unwrap_or_default();
        let from_status = via
            .len()
            .checked_sub(2)
            .and_then(|i| via.get(i))
            .map(|hop| hop.status.clone())
            .unwrap_or_default();

        trace.push(RedirectTrace {
            url: req.url.to_string(),
            status,
            from: from.clone(),
            from_status,
            timestamp: Utc::now(),
        });

        let count = via.len();
        if count >= self.options.max_redirect {
            return Err(Error::TooManyRedirects { count });
        }

        if self.options.only_https && req.url.scheme() == "http" {
            // http -> https is always a valid scheme change
            let _ = req.url.set_scheme("https");
        }

        if let Some(limiter) = &self.options.rate_limiter {
            limiter.wait(self.cancel).await?;
        }

        debug!(
            parent: self.span,
            from = %from,
            to = %req.url,
            redirect_count = count,
            max_redirect = self.options.max_redirect,
            "follow redirection"
        );

        Ok(RedirectAction::Follow)
    }
}

/// Same host and same explicit port
pub(crate) fn same_authority(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port() == b.port()
}
