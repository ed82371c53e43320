//! Client-side TLS over a raw byte transport.
//!
//! [`TlsSocket`] sits between a [`RawTransport`](tlsock_transport::RawTransport)
//! and its consumer. It drives a [`TlsEngine`] against the transport's
//! ciphertext, hands decrypted bytes to the consumer on demand, and turns
//! transport and engine outcomes into [`SocketEvent`](tlsock_transport::SocketEvent)s.
//!
//! Certificate verification layers a leaf common-name check
//! ([`verify::check_common_name`]) on top of the engine's own chain
//! validation. A rejected certificate is always fatal: the transport is
//! destroyed and the failure surfaces as a single error event.
//!
//! # Modules
//!
//! - [`anchors`]: trusted root certificates.
//! - [`verify`]: hostname verification policy.
//! - [`engine`]: TLS engine seam and its rustls implementation.
//! - [`socket`]: the duplex adapter and its lifecycle.

pub mod anchors;
pub mod engine;
pub mod error;
pub mod socket;
pub mod verify;

pub use anchors::{AnchorError, TrustAnchors};
pub use engine::{EngineEvent, EngineFactory, RustlsEngine, RustlsEngineFactory, TlsEngine};
pub use error::{EngineError, EngineErrorKind, TlsSocketError};
pub use socket::{LifecycleState, TlsSocket};
pub use verify::{HostnameVerifier, Verdict, check_common_name};

pub use rustls;
