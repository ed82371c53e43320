//! # tlsock
//!
//! Client-side TLS over a raw, byte-oriented transport, with a stricter
//! hostname check than the TLS library applies by default.
//!
//! ## Crates
//!
//! - [`tlsock_core`] - Default constants and error-kind labels
//! - [`tlsock_config`] - Configuration loading and validation
//! - [`tlsock_transport`] - Raw transport abstraction and TCP transport
//! - [`tlsock_tls`] - Hostname policy, TLS engine and the duplex socket
//! - [`tlsock_client`] - Session driver and CLI

pub use tlsock_client as client;
pub use tlsock_config as config;
pub use tlsock_core as core;
pub use tlsock_tls as tls;
pub use tlsock_transport as transport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use tlsock_config::{Config, load_config, validate_config};
    pub use tlsock_tls::{
        LifecycleState, RustlsEngineFactory, TlsSocket, TlsSocketError, TrustAnchors,
    };
    pub use tlsock_transport::{DuplexSocket, RawTransport, SocketEvent, TcpTransport, TransportEvent};
}
