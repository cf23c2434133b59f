//! CLI commands and argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// herald HTTP client CLI
#[derive(Parser, Debug)]
#[command(name = "herald")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Client settings file (YAML or JSON)
    #[arg(short, long, global = true)]
    pub settings: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one request and print the outcome
    Request(RequestArgs),

    /// Validate a client settings file
    Validate,
}

/// Arguments of the `request` command
#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// HTTP method, e.g. GET or POST
    pub method: String,

    /// Base URL, overrides the settings file
    #[arg(short, long)]
    pub url: Option<String>,

    /// Path appended to the base URL
    #[arg(short, long)]
    pub path: Option<String>,

    /// Request body
    #[arg(short, long)]
    pub data: Option<String>,

    /// Extra header, as `Name: value` (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Basic credentials, as `USER:SECRET`
    #[arg(long)]
    pub basic: Option<String>,

    /// Maximum number of redirects to follow
    #[arg(long)]
    pub max_redirect: Option<usize>,

    /// Return redirect responses instead of following them
    #[arg(long)]
    pub no_follow: bool,

    /// Allow plain HTTP and skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
