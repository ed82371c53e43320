//! TLS client session driver for tlsock.
//!
//! Wires a [`TcpTransport`](tlsock_transport::TcpTransport) to a
//! [`TlsSocket`](tlsock_tls::TlsSocket), sends an optional request once the
//! handshake succeeds and copies the decrypted response to a writer. Also
//! hosts the offline certificate check used by `tlsock check-cert`.

pub mod check;
pub mod cli;
mod error;
pub mod session;

pub use check::{CheckReport, check_chain, read_chain};
pub use cli::{CheckCertArgs, ConnectArgs};
pub use error::ClientError;
pub use session::{SessionSummary, load_anchors, run_session, unescape_request};
