//! CLI module for the response cache
//!
//! Every subcommand maps onto one cache operation against the configured
//! namespace, which makes it usable for inspecting and invalidating a live
//! cache from a shell.

pub mod commands;

use clap::{Args, Parser, Subcommand};

/// Response cache - namespaced Redis cache with pattern invalidation
#[derive(Parser)]
#[command(name = "response-cache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

/// Settings that take precedence over configuration files and environment
#[derive(Args, Debug, Default)]
pub struct Overrides {
    /// Namespace prefix
    #[arg(long, global = true)]
    pub prefix: Option<String>,

    /// Store backend (redis | memory)
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Store address (host, host:port or redis:// URL)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Per-command deadline in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print whether a key exists
    Has { key: String },

    /// Print the JSON value stored under a key
    Get { key: String },

    /// Store a value (parsed as JSON, otherwise stored as a string)
    Set {
        key: String,
        value: String,
        /// Expiry in seconds; the configured default TTL applies when omitted
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Delete a key
    Forget { key: String },

    /// Delete every key starting with the given pattern
    EmptyByMatch { pattern: String },

    /// Delete every key in the namespace
    Empty,

    /// Check the store is reachable
    Ping,
}
