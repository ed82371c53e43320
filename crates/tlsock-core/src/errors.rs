//! Error kind labels for structured logging.
//!
//! Every crate tags its `error_kind` log field with one of these so a single
//! filter can follow a failure from the transport up to the CLI.

/// TLS handshake error (protocol-level, before the session is established).
pub const ERROR_TLS_HANDSHAKE: &str = "tls_handshake";
/// Certificate chain or hostname verification error.
pub const ERROR_CERTIFICATE: &str = "certificate";
/// TLS record error after the handshake (decrypt failure, bad record).
pub const ERROR_TLS_RECORD: &str = "tls_record";
/// I/O error on the raw transport.
pub const ERROR_IO: &str = "io";
/// Timeout error.
pub const ERROR_TIMEOUT: &str = "timeout";
/// Configuration error.
pub const ERROR_CONFIG: &str = "config";
/// API misuse (write before connect, write after destroy).
pub const ERROR_MISUSE: &str = "misuse";
