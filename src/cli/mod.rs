//! CLI module
//!
//! Command-line interface around [`crate::http::Client`].
//!
//! # Commands
//!
//! - `request` - Send one request and print status, redirect trace and body
//! - `validate` - Check a client settings file

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat, RequestArgs};
pub use runner::Runner;
