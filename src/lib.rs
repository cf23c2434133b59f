// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]

//! # herald-http
//!
//! A concurrency-safe HTTP client with pluggable authentication, client
//! inheritance and an explicit redirect policy.
//!
//! ## Features
//!
//! - **Snapshots**: every request runs on a private copy of the client, so
//!   concurrent callers never see each other's header or query changes
//! - **Inheritance**: child clients extend the parent path and are closed
//!   together with their parent
//! - **Redirect policy**: hop limit, HTTPS upgrade, cross-host credential
//!   stripping and a per-hop trace
//! - **Auth**: HTTP Basic, HTTP Digest (RFC 7616 / RFC 2069) and the OAuth2
//!   Client Credentials grant (RFC 6749 §4.4)
//! - **Error rate**: share of failed requests over the last minute
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use herald_http::auth::Basic;
//! use herald_http::http::JsonBody;
//! use herald_http::{Client, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::builder("https://api.example.com/v1")
//!         .authenticator(Box::new(Basic::new("alice", "s3cr3t")?))
//!         .build()?;
//!
//!     let users = client.new_child("/users")?;
//!     let mut body = JsonBody::<serde_json::Value>::new();
//!     let response = users.execute("GET", None, Some(&mut body)).await?;
//!     println!("{} in {:?}", response.status, response.response_time);
//!
//!     client.close().await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Client: URL, headers, query, options, authenticator        │
//! │  try_clone() · new_child(path) · close() · is_closed()      │
//! └─────────────────────────────┬───────────────────────────────┘
//!                               │ execute / execute_with_marshal
//! ┌──────────────┬──────────────┴───┬──────────────┬────────────┐
//! │ Authenticator│  Rate limiter    │  Redirect    │ Error rate │
//! ├──────────────┼──────────────────┼──────────────┼────────────┤
//! │ Basic        │  Token bucket    │  Hop limit   │ 60 s window│
//! │ Digest       │                  │  HTTPS only  │            │
//! │ OAuth2 CC    │                  │  Auth strip  │            │
//! └──────────────┴──────────────────┴──────────────┴────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// HTTP methods and path helpers
pub mod types;

/// Redacted secret strings
pub mod secret;

/// Authentication strategies
pub mod auth;

/// HTTP client, executor and redirect policy
pub mod http;

/// Client settings files
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use auth::Authenticator;
pub use config::{load_settings, load_settings_from_str, ClientSettings};
pub use error::{Error, ErrorKind, Result};
pub use http::{Client, ClientBuilder, Options, Response};
pub use secret::Secret;
pub use types::Method;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
