//! Error types for mesh-dns.

use thiserror::Error;

/// Errors that can occur in the DNS server.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (socket bind, send/receive, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// Controller HTTP request failed (connect, timeout, body decode)
    #[error("controller request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Controller answered with a non-success status
    #[error("controller returned HTTP {status} for {url}")]
    Controller {
        /// HTTP status code of the reply.
        status: u16,
        /// Request URL, for the log line.
        url: String,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The server's own name did not resolve at startup
    #[error("cannot resolve server name {name}: {reason}")]
    Resolve {
        /// The configured server FQDN.
        name: String,
        /// Why resolution failed.
        reason: String,
    },

    /// No listener address could be bound
    #[error("no listener could be bound")]
    NoListeners,
}
