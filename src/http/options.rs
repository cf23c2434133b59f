//! Client policy options

use super::rate_limit::RateLimiter;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(35);

/// Default number of redirects followed before giving up
pub const DEFAULT_MAX_REDIRECT: usize = 2;

/// Policy flags applied to every request of a client
#[derive(Clone)]
pub struct Options {
    /// Rewrite `http` targets, including redirect targets, to `https`
    pub only_https: bool,
    /// Follow redirects at all
    pub follow: bool,
    /// Keep `Authorization` when a redirect changes host
    pub follow_auth: bool,
    /// Keep `Referer` on redirects
    pub follow_referer: bool,
    pub max_redirect: usize,
    /// Whole-request timeout, zero disables it
    pub timeout: Duration,
    pub disable_tls_verify: bool,
    /// Shared by every clone and child of the client
    pub rate_limiter: Option<Arc<dyn RateLimiter>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            only_https: true,
            follow: true,
            follow_auth: false,
            follow_referer: true,
            max_redirect: DEFAULT_MAX_REDIRECT,
            timeout: DEFAULT_TIMEOUT,
            disable_tls_verify: false,
            rate_limiter: None,
        }
    }
}

impl Options {
    /// Create a new options builder
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    /// Defaults, without HTTPS enforcement. Meant for local plain-HTTP servers.
    pub fn insecure() -> Self {
        Self {
            only_https: false,
            ..Self::default()
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("only_https", &self.only_https)
            .field("follow", &self.follow)
            .field("follow_auth", &self.follow_auth)
            .field("follow_referer", &self.follow_referer)
            .field("max_redirect", &self.max_redirect)
            .field("timeout", &self.timeout)
            .field("disable_tls_verify", &self.disable_tls_verify)
            .field("rate_limiter", &self.rate_limiter.is_some())
            .finish()
    }
}

/// Builder for [`Options`]
#[derive(Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    pub fn only_https(mut self, only_https: bool) -> Self {
        self.options.only_https = only_https;
        self
    }

    pub fn follow(mut self, follow: bool) -> Self {
        self.options.follow = follow;
        self
    }

    pub fn follow_auth(mut self, follow_auth: bool) -> Self {
        self.options.follow_auth = follow_auth;
        self
    }

    pub fn follow_referer(mut self, follow_referer: bool) -> Self {
        self.options.follow_referer = follow_referer;
        self
    }

    pub fn max_redirect(mut self, max_redirect: usize) -> Self {
        self.options.max_redirect = max_redirect;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    pub fn disable_tls_verify(mut self, disable: bool) -> Self {
        self.options.disable_tls_verify = disable;
        self
    }

    /// Set rate limiter
    pub fn rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.options.rate_limiter = Some(limiter);
        self
    }

    /// Build the options
    pub fn build(self) -> Options {
        self.options
    }
}
