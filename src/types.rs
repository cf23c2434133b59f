//! Common types used throughout herald-http
//!
//! This module contains the HTTP method vocabulary and small helpers
//! shared by the client and the authenticators.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// HTTP Types
// ============================================================================

/// HTTP request method (RFC 9110 and RFC 5789)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    HEAD,
    POST,
    PUT,
    DELETE,
    CONNECT,
    OPTIONS,
    TRACE,
    PATCH,
}

impl Method {
    /// Every supported method, in RFC order
    pub const ALL: [Method; 9] = [
        Method::GET,
        Method::HEAD,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::CONNECT,
        Method::OPTIONS,
        Method::TRACE,
        Method::PATCH,
    ];

    /// Wire name of the method
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::CONNECT => "CONNECT",
            Method::OPTIONS => "OPTIONS",
            Method::TRACE => "TRACE",
            Method::PATCH => "PATCH",
        }
    }
}

impl FromStr for Method {
    type Err = Error;

    /// Method names are case-sensitive, as on the wire.
    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::invalid_method("method cannot be empty"));
        }

        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| Error::invalid_method(format!("unsupported method: {s}")))
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => reqwest::Method::GET,
            Method::HEAD => reqwest::Method::HEAD,
            Method::POST => reqwest::Method::POST,
            Method::PUT => reqwest::Method::PUT,
            Method::DELETE => reqwest::Method::DELETE,
            Method::CONNECT => reqwest::Method::CONNECT,
            Method::OPTIONS => reqwest::Method::OPTIONS,
            Method::TRACE => reqwest::Method::TRACE,
            Method::PATCH => reqwest::Method::PATCH,
        }
    }
}

// ============================================================================
// Path helpers
// ============================================================================

/// Normalize a URL path: always one leading slash, never a trailing one.
///
/// `""` and `"/"` both become `"/"`.
pub fn format_path(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_string();
    }

    let mut formatted = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };

    if formatted.ends_with('/') {
        formatted.pop();
    }

    formatted
}

/// Append `suffix` to `base`. The suffix is normalized with [`format_path`];
/// an empty or root suffix leaves `base` unchanged.
pub fn join_path(base: &str, suffix: &str) -> String {
    let suffix = format_path(suffix);
    if suffix == "/" {
        return base.to_string();
    }

    match base.trim_end_matches('/') {
        "" => suffix,
        base => format!("{base}{suffix}"),
    }
}
