//! Response types

use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// One followed redirect hop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectTrace {
    /// Target of the hop
    pub url: String,
    /// Status line of the response that asked for the hop
    pub status: String,
    /// URL that answered with the redirect
    pub from: String,
    /// Status line of the hop before, empty for the first one
    pub from_status: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a request
#[derive(Debug, Clone)]
pub struct Response {
    /// True when the status is below 400
    pub success: bool,
    pub status_code: u16,
    /// Status line, e.g. `200 OK`
    pub status: String,
    /// Protocol, e.g. `HTTP/1.1`
    pub proto: String,
    pub headers: HeaderMap,
    /// Raw body, empty when the server declared no content
    pub body: Bytes,
    /// Time until the final response headers arrived
    pub response_time: Duration,
    pub redirect_trace: Vec<RedirectTrace>,
    /// Client error rate over the last minute, in percent
    pub error_rate: f64,
    /// URL of the final response
    pub url: Url,
}

impl Response {
    /// Body as UTF-8 text, lossy
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// `"<code> <reason>"`, like the status line without protocol
pub(crate) fn status_line(status: reqwest::StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_u16()),
        None => status.as_u16().to_string(),
    }
}
