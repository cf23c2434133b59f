//! Client lifecycle
//!
//! A [`Client`] owns its configuration behind a lock. It can be deep-copied
//! with [`Client::try_clone`], specialised with [`Client::new_child`] and
//! shut down with [`Client::close`], which cascades to every child.

use super::error_rate::{ErrorHistory, ErrorRateTracker};
use super::options::Options;
use crate::auth::Authenticator;
use crate::error::{Error, Result};
use crate::types::{format_path, join_path};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Span};
use url::Url;

/// Interval at which `close` polls for in-flight requests
const CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Query parameters, kept sorted by key
pub type QueryMap = BTreeMap<String, Vec<String>>;

// ============================================================================
// Shared state
// ============================================================================

/// Mutable configuration, guarded by the client lock
pub(crate) struct ClientConfig {
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
    pub(crate) query: QueryMap,
    pub(crate) options: Options,
    pub(crate) auth: Option<Arc<dyn Authenticator>>,
}

pub(crate) struct Shared {
    pub(crate) config: RwLock<ClientConfig>,
    closed: AtomicBool,
    pub(crate) active_requests: AtomicUsize,
    pub(crate) errors: Mutex<ErrorRateTracker>,
    children: Mutex<Vec<Arc<Shared>>>,
    pub(crate) cancel: CancellationToken,
    pub(crate) span: Span,
}

impl Shared {
    fn new(config: ClientConfig, cancel: CancellationToken, span: Span) -> Self {
        Self {
            config: RwLock::new(config),
            closed: AtomicBool::new(false),
            active_requests: AtomicUsize::new(0),
            errors: Mutex::new(ErrorRateTracker::new()),
            children: Mutex::new(Vec::new()),
            cancel,
            span,
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.cancel.is_cancelled()
    }

    fn register_child(&self, child: Arc<Shared>) {
        let mut children = self.children.lock();
        children.retain(|c| !c.is_closed());
        children.push(child);
    }

    /// Wait for in-flight requests, bounded by `timeout` and by cancellation.
    /// Returns true when none are left.
    async fn drain(&self, timeout: Duration) -> bool {
        let idle = async {
            while self.active_requests.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(CLOSE_POLL_INTERVAL).await;
            }
        };

        tokio::select! {
            _ = tokio::time::timeout(timeout, idle) => {}
            () = self.cancel.cancelled() => {}
        }

        self.active_requests.load(Ordering::SeqCst) == 0
    }

    fn close(self: Arc<Self>) -> BoxFuture<'static, ()> {
        async move {
            if self.closed.swap(true, Ordering::SeqCst) {
                self.cancel.cancel();
                return;
            }

            let (url, timeout) = {
                let config = self.config.read();
                (config.url.to_string(), config.options.timeout)
            };
            debug!(
                parent: &self.span,
                url = %url,
                active_requests = self.active_requests.load(Ordering::SeqCst),
                "closing http client"
            );

            if self.drain(timeout).await {
                debug!(parent: &self.span, url = %url, "http client closed successfully");
            } else {
                warn!(
                    parent: &self.span,
                    url = %url,
                    active_requests = self.active_requests.load(Ordering::SeqCst),
                    "http client close timed out with active requests"
                );
            }

            // Children drain on their own tokens before ours cascades to them
            let children = std::mem::take(&mut *self.children.lock());
            join_all(children.into_iter().map(Shared::close)).await;

            self.cancel.cancel();
            {
                let mut config = self.config.write();
                config.headers.clear();
                config.query.clear();
                config.auth = None;
            }
            self.errors.lock().clear();
        }
        .boxed()
    }
}

/// Marks one in-flight request for the lifetime of the guard
pub(crate) struct ActiveRequest<'a>(&'a Shared);

impl<'a> ActiveRequest<'a> {
    pub(crate) fn new(shared: &'a Shared) -> Self {
        shared.active_requests.fetch_add(1, Ordering::SeqCst);
        Self(shared)
    }
}

impl Drop for ActiveRequest<'_> {
    fn drop(&mut self) {
        self.0.active_requests.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client handle.
///
/// The handle is unique: copies are made explicitly with
/// [`Client::try_clone`] or [`Client::new_child`]. Dropping a handle marks
/// the client closed and cancels its token.
pub struct Client {
    pub(crate) shared: Arc<Shared>,
}

/// Builder for [`Client`]
pub struct ClientBuilder {
    url: String,
    auth: Option<Box<dyn Authenticator>>,
    options: Options,
    span: Option<Span>,
    parent: Option<CancellationToken>,
}

impl ClientBuilder {
    /// Attach an authenticator
    pub fn authenticator(mut self, auth: Box<dyn Authenticator>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Span used as parent of every log event of the client family
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Derive the client token from `parent`, so cancelling it closes the client
    pub fn parent(mut self, parent: &CancellationToken) -> Self {
        self.parent = Some(parent.child_token());
        self
    }

    /// Validate the URL and build the client
    pub fn build(self) -> Result<Client> {
        if self.url.is_empty() {
            return Err(Error::EmptyServerUrl);
        }

        let raw = self.url.strip_suffix('/').unwrap_or(&self.url);
        let mut url = Url::parse(raw).map_err(|source| Error::InvalidUrl {
            url: self.url.clone(),
            source,
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "unsupported URL scheme '{}' in '{}'",
                url.scheme(),
                self.url
            )));
        }

        let span = self.span.unwrap_or_else(|| info_span!("http_client"));

        if self.options.only_https && url.scheme() == "http" {
            // http -> https is always a valid scheme change
            let _ = url.set_scheme("https");
            debug!(parent: &span, url = %url, "scheme updated to https due to only_https option");
        }

        if self.options.disable_tls_verify {
            warn!(parent: &span, url = %url, "TLS verification disabled for this client");
        }

        let path = format_path(url.path());
        url.set_path(&path);

        let mut query = QueryMap::new();
        for (key, value) in url.query_pairs() {
            query
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }
        url.set_query(None);

        let config = ClientConfig {
            url,
            headers: HeaderMap::new(),
            query,
            options: self.options,
            auth: self.auth.map(Arc::from),
        };
        let cancel = self.parent.unwrap_or_default();

        Ok(Client {
            shared: Arc::new(Shared::new(config, cancel, span)),
        })
    }
}

impl Client {
    /// Start building a client for `server_url`
    pub fn builder(server_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder {
            url: server_url.into(),
            auth: None,
            options: Options::default(),
            span: None,
            parent: None,
        }
    }

    /// Client with default options and no authentication
    pub fn new(server_url: impl Into<String>) -> Result<Self> {
        Self::builder(server_url).build()
    }

    /// Independent copy.
    ///
    /// The copy shares the span and the rate limiter, and gets its own lock,
    /// headers, query, error history, authenticator clone and a token derived
    /// from this client's token. Fails with [`Error::ClientClosed`] when this
    /// client is closed.
    pub fn try_clone(&self) -> Result<Client> {
        if self.is_closed() {
            return Err(Error::ClientClosed);
        }

        let config = {
            let config = self.shared.config.read();
            ClientConfig {
                url: config.url.clone(),
                headers: config.headers.clone(),
                query: config.query.clone(),
                options: config.options.clone(),
                auth: config
                    .auth
                    .as_ref()
                    .map(|auth| Arc::from(auth.clone_box())),
            }
        };

        Ok(Client {
            shared: Arc::new(Shared::new(
                config,
                self.shared.cancel.child_token(),
                self.shared.span.clone(),
            )),
        })
    }

    /// Copy with `path` appended to the URL path, closed together with
    /// this client.
    pub fn new_child(&self, path: &str) -> Result<Client> {
        let child = self.try_clone()?;

        if !path.is_empty() {
            let mut config = child.shared.config.write();
            let joined = join_path(config.url.path(), path);
            config.url.set_path(&joined);
        }

        self.shared.register_child(Arc::clone(&child.shared));

        debug!(
            parent: &self.shared.span,
            parent_url = %self.url(),
            child_url = %child.url(),
            "new child client created"
        );

        Ok(child)
    }

    /// Closed copy of this client, used where a copy is required but the
    /// source is already closed
    pub(crate) fn closed_copy(&self) -> Client {
        let url = self.shared.config.read().url.clone();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let shared = Shared::new(
            ClientConfig {
                url,
                headers: HeaderMap::new(),
                query: QueryMap::new(),
                options: Options::default(),
                auth: None,
            },
            cancel,
            self.shared.span.clone(),
        );
        shared.closed.store(true, Ordering::SeqCst);

        Client {
            shared: Arc::new(shared),
        }
    }

    /// Shut the client down.
    ///
    /// The first call refuses new requests, waits up to the configured
    /// timeout for in-flight ones, closes every child concurrently, then
    /// cancels the token and releases the configuration. Later calls only
    /// make sure the token is cancelled.
    pub async fn close(&self) -> Result<()> {
        Arc::clone(&self.shared).close().await;
        Ok(())
    }

    /// True once closed, or once the token was cancelled from outside
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    // ------------------------------------------------------------------------
    // Configuration accessors
    // ------------------------------------------------------------------------

    /// Base URL, without query
    pub fn url(&self) -> Url {
        self.shared.config.read().url.clone()
    }

    pub fn options(&self) -> Options {
        self.shared.config.read().options.clone()
    }

    pub fn set_options(&self, options: Options) {
        self.shared.config.write().options = options;
    }

    pub fn authenticator(&self) -> Option<Arc<dyn Authenticator>> {
        self.shared.config.read().auth.clone()
    }

    pub fn set_authenticator(&self, auth: Option<Box<dyn Authenticator>>) {
        self.shared.config.write().auth = auth.map(Arc::from);
    }

    pub fn headers(&self) -> HeaderMap {
        self.shared.config.read().headers.clone()
    }

    /// Replace every value of `name`
    pub fn set_header(&self, name: &str, value: impl AsRef<str>) -> Result<()> {
        let (name, value) = header_pair(name, value.as_ref())?;
        self.shared.config.write().headers.insert(name, value);
        Ok(())
    }

    /// Add a value to `name`, keeping the existing ones
    pub fn append_header(&self, name: &str, value: impl AsRef<str>) -> Result<()> {
        let (name, value) = header_pair(name, value.as_ref())?;
        self.shared.config.write().headers.append(name, value);
        Ok(())
    }

    pub fn remove_header(&self, name: &str) {
        self.shared.config.write().headers.remove(name);
    }

    /// Remove every header
    pub fn flush_headers(&self) -> &Self {
        let mut config = self.shared.config.write();
        debug!(
            parent: &self.shared.span,
            current_headers = ?config.headers.keys().collect::<Vec<_>>(),
            "flushing headers"
        );
        config.headers.clear();
        self
    }

    pub fn query(&self) -> QueryMap {
        self.shared.config.read().query.clone()
    }

    /// Replace every value of `key`
    pub fn set_query(&self, key: impl Into<String>, value: impl Into<String>) {
        self.shared
            .config
            .write()
            .query
            .insert(key.into(), vec![value.into()]);
    }

    /// Add a value to `key`, keeping the existing ones
    pub fn append_query(&self, key: impl Into<String>, value: impl Into<String>) {
        self.shared
            .config
            .write()
            .query
            .entry(key.into())
            .or_default()
            .push(value.into());
    }

    pub fn remove_query(&self, key: &str) {
        self.shared.config.write().query.remove(key);
    }

    /// Remove every query parameter
    pub fn flush_query(&self) -> &Self {
        let mut config = self.shared.config.write();
        debug!(parent: &self.shared.span, current_query = ?config.query, "flushing query parameters");
        config.query.clear();
        self
    }

    // ------------------------------------------------------------------------
    // Runtime state
    // ------------------------------------------------------------------------

    pub fn active_requests(&self) -> usize {
        self.shared.active_requests.load(Ordering::SeqCst)
    }

    /// Outcomes recorded during the last minute
    pub fn error_history(&self) -> Vec<ErrorHistory> {
        self.shared.errors.lock().history().to_vec()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    pub fn span(&self) -> &Span {
        &self.shared.span
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.cancel.cancel();
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.shared.config.read();
        f.debug_struct("Client")
            .field("url", &config.url.as_str())
            .field("options", &config.options)
            .field("auth", &config.auth.as_ref().map(|a| a.name().to_string()))
            .field("closed", &self.is_closed())
            .field("active_requests", &self.active_requests())
            .finish_non_exhaustive()
    }
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name =
        HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::invalid_header(name, e))?;
    let header_value = HeaderValue::from_str(value).map_err(|e| Error::invalid_header(name, e))?;
    Ok((header_name, header_value))
}

/// Encode the query, sorted by key, values in insertion order
pub(crate) fn encode_query(query: &QueryMap) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, values) in query {
        for value in values {
            serializer.append_pair(key, value);
        }
    }
    serializer.finish()
}
