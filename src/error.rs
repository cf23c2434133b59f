//! Error types for herald-http
//!
//! This module defines the error hierarchy for the whole crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for herald-http
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("server URL cannot be empty")]
    EmptyServerUrl,

    #[error("invalid server URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid URL query parameters: {message}")]
    InvalidQuery { message: String },

    #[error("invalid timeout value: {message}")]
    InvalidTimeout { message: String },

    #[error("invalid redirect limit: must be >= 0, got {value}")]
    InvalidRedirectLimit { value: i64 },

    #[error("invalid header '{name}': {message}")]
    InvalidHeader { name: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Credential Errors
    // ============================================================================
    #[error("missing user id")]
    MissingUserId,

    #[error("missing secret")]
    MissingSecret,

    #[error("missing realm parameter")]
    MissingRealm,

    #[error("missing nonce parameter")]
    MissingNonce,

    #[error("missing URI parameter")]
    MissingUri,

    #[error("unknown digest algorithm '{name}'")]
    UnknownAlgorithm { name: String },

    // ============================================================================
    // Request Errors
    // ============================================================================
    #[error("invalid HTTP method: {message}")]
    InvalidMethod { message: String },

    #[error("http client is closed")]
    ClientClosed,

    #[error("too many redirects: stopped after {count} redirects")]
    TooManyRedirects { count: usize },

    #[error("nil trace was provided")]
    NoTrace,

    #[error("operation cancelled")]
    Cancelled,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("an error occurred while making the request: {source}")]
    RequestFailed {
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to marshal body with '{marshaler}': {source}")]
    Marshal {
        marshaler: String,
        #[source]
        source: anyhow::Error,
    },

    // ============================================================================
    // Token Refresh Errors
    // ============================================================================
    #[error("the authorization server returned an unexpected status code {status}{}", error_suffix(.error))]
    UnexpectedStatusCode { status: u16, error: Option<String> },

    #[error("the authorization server returned an empty body")]
    EmptyBody,

    #[error("the authorization server returned a response without a token")]
    MissingToken,

    #[error("invalid token response: {message}")]
    InvalidTokenResponse { message: String },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

/// Broad classification of an [`Error`], for callers that branch on the
/// failure family rather than the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Returned synchronously while building a client or authenticator
    Config,
    /// Missing or unusable credential material
    Credentials,
    /// Raised while a request is being prepared or executed
    Request,
    /// Raised while obtaining a new OAuth2 access token
    TokenRefresh,
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid header error
    pub fn invalid_header(name: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidHeader {
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// Create an invalid method error
    pub fn invalid_method(message: impl Into<String>) -> Self {
        Self::InvalidMethod {
            message: message.into(),
        }
    }

    /// Wrap a body read or unmarshal failure
    pub fn request_failed(source: impl Into<anyhow::Error>) -> Self {
        Self::RequestFailed {
            source: source.into(),
        }
    }

    /// Failure family of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EmptyServerUrl
            | Error::InvalidUrl { .. }
            | Error::InvalidQuery { .. }
            | Error::InvalidTimeout { .. }
            | Error::InvalidRedirectLimit { .. }
            | Error::InvalidHeader { .. }
            | Error::Config { .. }
            | Error::YamlParse(_)
            | Error::JsonParse(_)
            | Error::Io(_) => ErrorKind::Config,

            Error::MissingUserId
            | Error::MissingSecret
            | Error::MissingRealm
            | Error::MissingNonce
            | Error::MissingUri
            | Error::UnknownAlgorithm { .. } => ErrorKind::Credentials,

            Error::UnexpectedStatusCode { .. }
            | Error::EmptyBody
            | Error::MissingToken
            | Error::InvalidTokenResponse { .. } => ErrorKind::TokenRefresh,

            Error::InvalidMethod { .. }
            | Error::ClientClosed
            | Error::TooManyRedirects { .. }
            | Error::NoTrace
            | Error::Cancelled
            | Error::Http(_)
            | Error::RequestFailed { .. }
            | Error::Marshal { .. }
            | Error::Other(_) => ErrorKind::Request,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            Error::Cancelled => true,
            Error::UnexpectedStatusCode { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

fn error_suffix(error: &Option<String>) -> String {
    error
        .as_deref()
        .map(|code| format!(" ({code})"))
        .unwrap_or_default()
}

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for herald-http
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
