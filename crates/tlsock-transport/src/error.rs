//! Error types for the transport crate.

use thiserror::Error;
use tlsock_core::errors::{ERROR_IO, ERROR_TIMEOUT};

/// Errors raised by a raw transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no async runtime available to drive the transport")]
    NoRuntime,
}

impl TransportError {
    /// Error kind label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(e) | Self::Connect { source: e, .. }
                if e.kind() == std::io::ErrorKind::TimedOut =>
            {
                ERROR_TIMEOUT
            }
            _ => ERROR_IO,
        }
    }
}
