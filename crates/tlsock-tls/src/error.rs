//! Error types for the TLS socket.

use std::fmt;

use rustls::AlertDescription;
use thiserror::Error;
use tlsock_core::errors::{
    ERROR_CERTIFICATE, ERROR_CONFIG, ERROR_IO, ERROR_MISUSE, ERROR_TLS_HANDSHAKE, ERROR_TLS_RECORD,
};
use tlsock_transport::TransportError;

/// Coarse classification of an engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// The handshake could not be completed.
    Handshake,
    /// The peer's certificate chain was rejected.
    Certificate,
    /// A record could not be decrypted or was malformed after establishment.
    Record,
    /// The session could not be configured.
    Config,
    /// Moving bytes in or out of the engine failed.
    Io,
}

impl EngineErrorKind {
    /// Error kind label used in log fields.
    pub fn label(self) -> &'static str {
        match self {
            Self::Handshake => ERROR_TLS_HANDSHAKE,
            Self::Certificate => ERROR_CERTIFICATE,
            Self::Record => ERROR_TLS_RECORD,
            Self::Config => ERROR_CONFIG,
            Self::Io => ERROR_IO,
        }
    }
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Handshake => "handshake failed",
            Self::Certificate => "certificate rejected",
            Self::Record => "record error",
            Self::Config => "configuration error",
            Self::Io => "engine I/O error",
        };
        f.write_str(s)
    }
}

/// A fatal TLS engine failure.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct EngineError {
    kind: EngineErrorKind,
    alert: Option<AlertDescription>,
    message: String,
    #[source]
    cause: Option<rustls::Error>,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            alert: None,
            message: message.into(),
            cause: None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Config, message)
    }

    pub fn io(error: std::io::Error) -> Self {
        Self::new(EngineErrorKind::Io, error.to_string())
    }

    /// Classify a rustls error. `established` tells record failures apart
    /// from handshake failures.
    pub fn from_rustls(error: rustls::Error, established: bool) -> Self {
        use rustls::Error as E;

        let (kind, alert) = match &error {
            E::InvalidCertificate(cert) => (EngineErrorKind::Certificate, Some(cert.clone().into())),
            E::NoCertificatesPresented | E::UnsupportedNameType => {
                (EngineErrorKind::Certificate, Some(AlertDescription::BadCertificate))
            }
            E::AlertReceived(alert) => {
                let kind = if established {
                    EngineErrorKind::Record
                } else {
                    EngineErrorKind::Handshake
                };
                (kind, Some(*alert))
            }
            E::DecryptError => (EngineErrorKind::Record, Some(AlertDescription::BadRecordMac)),
            E::General(_) | E::Other(_) | E::FailedToGetCurrentTime | E::FailedToGetRandomBytes => {
                (EngineErrorKind::Config, None)
            }
            _ if established => (EngineErrorKind::Record, None),
            _ => (EngineErrorKind::Handshake, None),
        };
        Self {
            kind,
            alert,
            message: error.to_string(),
            cause: Some(error),
        }
    }

    /// Replace the message, keeping kind, alert and cause.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn kind(&self) -> EngineErrorKind {
        self.kind
    }

    /// TLS alert associated with the failure, sent or received.
    pub fn alert(&self) -> Option<AlertDescription> {
        self.alert
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The underlying rustls error, if the failure came from rustls.
    pub fn rustls_error(&self) -> Option<&rustls::Error> {
        self.cause.as_ref()
    }
}

/// Errors surfaced by [`TlsSocket`](crate::TlsSocket).
#[derive(Debug, Error)]
pub enum TlsSocketError {
    #[error("socket is not connected")]
    NotConnected,

    #[error("socket is already connected")]
    AlreadyConnected,

    #[error("socket has been destroyed")]
    Destroyed,

    #[error("socket is closed")]
    Closed,

    #[error("invalid port: {0}")]
    InvalidPort(u16),

    #[error("invalid hostname: {0:?}")]
    InvalidHostname(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("TLS error: {0}")]
    Tls(#[from] EngineError),
}

impl TlsSocketError {
    /// Error kind label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(e) => e.kind(),
            Self::Tls(e) => e.kind().label(),
            _ => ERROR_MISUSE,
        }
    }

    /// TLS alert carried by the error, if any.
    pub fn alert(&self) -> Option<AlertDescription> {
        match self {
            Self::Tls(e) => e.alert(),
            _ => None,
        }
    }

    /// Whether the error came from calling the socket in the wrong state.
    pub fn is_misuse(&self) -> bool {
        !matches!(self, Self::Transport(_) | Self::Tls(_))
    }
}
