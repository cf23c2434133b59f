//! Authentication module
//!
//! Supports: HTTP Basic, HTTP Digest (RFC 7616 with RFC 2069 fallback),
//! OAuth2 Client Credentials (RFC 6749 §4.4)
//!
//! Every strategy implements [`Authenticator`]. A client holds one
//! authenticator, asks it to refresh before each request and then asks it
//! for the header to attach.

mod basic;
mod digest;
pub mod oauth2;

pub use basic::{basic_user_pass, Basic};
pub use digest::{Digest, DigestAlgorithm, DigestParameters, Qop};

use crate::error::Result;
use crate::types::Method;
use async_trait::async_trait;
use std::any::Any;
use std::fmt::Debug;
use url::Url;

/// Header name every built-in strategy writes to
pub const AUTHORIZATION: &str = "Authorization";

/// A pluggable authentication strategy
#[async_trait]
pub trait Authenticator: Send + Sync + Debug {
    /// Identifier of the strategy, e.g. `auth.Basic`
    fn name(&self) -> &str;

    /// Refresh credentials if needed. No-op when there is nothing to refresh.
    async fn update(&self) -> Result<()>;

    /// Produce the `(header name, header value)` pair for a request
    fn header(&self, method: &Method, url: &Url, body: &[u8]) -> Result<(String, String)>;

    /// Independent copy: mutating the copy never affects `self`
    fn clone_box(&self) -> Box<dyn Authenticator>;

    /// Downcast support, mostly for inspecting a concrete strategy
    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn Authenticator> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
