//! Client error types.

use std::time::Duration;

use tlsock_config::ConfigError;
use tlsock_core::errors::{ERROR_CERTIFICATE, ERROR_CONFIG, ERROR_IO, ERROR_TIMEOUT};
use tlsock_tls::{AnchorError, TlsSocketError};

/// Errors that can occur while running a client session.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("trust anchors: {0}")]
    Anchors(#[from] AnchorError),

    #[error("{0}")]
    Socket(#[from] TlsSocketError),

    #[error("TLS handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    #[error("connection idle for {0:?}")]
    IdleTimeout(Duration),

    #[error("no certificate found in {0}")]
    NoCertificate(String),

    #[error("{0}")]
    Usage(String),
}

impl ClientError {
    /// Error kind label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => ERROR_IO,
            Self::Config(_) | Self::Usage(_) => ERROR_CONFIG,
            Self::Anchors(_) | Self::NoCertificate(_) => ERROR_CERTIFICATE,
            Self::Socket(e) => e.kind(),
            Self::HandshakeTimeout(_) | Self::IdleTimeout(_) => ERROR_TIMEOUT,
        }
    }
}
