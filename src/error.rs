//! Error types for the feed client and the web server

use std::time::Duration;
use thiserror::Error;

/// Reasons a feed fetch can fail. The refresher treats all of them the same:
/// the current snapshot stays published.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Transport failure: DNS, connect, TLS, body read
    #[error("Request failed: {0}")]
    Request(String),

    /// Upstream answered with a non-success status
    #[error("Feed returned HTTP {0}")]
    Status(u16),

    /// Payload is not a GeoJSON feature collection
    #[error("Decode error: {0}")]
    Decode(String),

    /// Fetch did not complete within the configured bound
    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors that can occur when starting or running the web server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the network address
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving
    #[error("serve error: {0}")]
    Serve(String),
}
