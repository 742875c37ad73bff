//! Error types for the fleet-exporter crate.

use std::net::SocketAddr;
use std::path::PathBuf;

use fleet_tags::{ConfigError, EvalError};
use thiserror::Error;

/// Errors raised while fetching the cluster inventory.
///
/// Fetch failures are per-cycle and recoverable: the exporter keeps
/// serving the last published snapshot and retries on the next tick.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP request itself failed.
    #[error("inventory request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The inventory endpoint answered with a non-success status.
    #[error("inventory endpoint returned status {status}")]
    Status {
        /// The HTTP status code.
        status: u16,
    },

    /// The response body could not be decoded into cluster records.
    #[error("inventory response decode failed: {reason}")]
    Decode {
        /// The reason decoding failed.
        reason: String,
    },

    /// The fetch did not complete within the configured bound.
    #[error("inventory fetch timed out after {seconds}s")]
    Timeout {
        /// The timeout that elapsed, in seconds.
        seconds: u64,
    },
}

/// The first unrecoverable error of a synchronization cycle.
///
/// Only produced under the abort-cycle failure policy; it never
/// crosses the scrape path.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Label resolution failed for a cluster.
    #[error("cluster {cluster}: {source}")]
    Resolve {
        /// The offending cluster's display name.
        cluster: String,
        /// The underlying resolution error.
        #[source]
        source: EvalError,
    },
}

/// Errors raised while loading the settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("failed to read settings file {path}: {source}")]
    Io {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid YAML of the expected shape.
    #[error("failed to parse settings file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The tag configuration inside the settings file is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised by the metrics HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding the listen address failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that could not be bound.
        addr: SocketAddr,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The server loop exited with an error.
    #[error("metrics server failed: {0}")]
    Serve(#[source] std::io::Error),
}
