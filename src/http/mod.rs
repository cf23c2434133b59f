//! HTTP client module
//!
//! Provides a concurrency-safe client with pluggable authentication,
//! parent/child inheritance and a redirect policy.
//!
//! # Features
//!
//! - **Snapshots**: each request runs on a private copy of the client
//! - **Inheritance**: children extend the parent path and close with it
//! - **Redirect policy**: hop limit, HTTPS upgrade, credential stripping
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Error rate**: share of failed requests over the last minute

mod client;
mod codec;
mod error_rate;
mod execute;
mod options;
mod rate_limit;
mod redirect;
mod types;

pub use client::{Client, ClientBuilder, QueryMap};
pub use codec::{Json, JsonBody, Marshaler, Unmarshaler};
pub use error_rate::{ErrorHistory, ErrorRateTracker, ERROR_RATE_WINDOW_SECS};
pub use options::{Options, OptionsBuilder, DEFAULT_MAX_REDIRECT, DEFAULT_TIMEOUT};
pub use rate_limit::{RateLimiter, RateLimiterConfig, TokenBucket};
pub use redirect::{Hop, RedirectAction, RedirectPolicy, RedirectRequest};
pub use types::{RedirectTrace, Response};

#[cfg(test)]
mod tests;
