//! Raw transport abstraction for tlsock.
//!
//! A raw transport is a byte-oriented connection primitive (a TCP socket, or
//! an in-memory stand-in in tests). It is driven by commands (`connect`,
//! `write`, `destroy`, socket options) and reports what happened as
//! [`TransportEvent`]s, which the owner feeds into whatever sits on top of
//! it, typically a [`DuplexSocket`].
//!
//! # Transports
//!
//! - [`tcp`]: tokio-backed TCP transport.

pub mod error;
pub mod tcp;

use std::time::Duration;

use bytes::Bytes;

pub use error::TransportError;
pub use tcp::TcpTransport;

/// Callback invoked when the transport has been idle for the configured timeout.
pub type TimeoutCallback = Box<dyn FnMut() + Send + 'static>;

/// One-shot listener invoked when a socket reaches its connected state.
pub type ConnectCallback = Box<dyn FnOnce() + Send + 'static>;

/// Something the raw transport reports to its owner.
#[derive(Debug)]
pub enum TransportEvent {
    /// The connection to the remote peer is established.
    Connect,
    /// Bytes arrived from the peer. Delivery may be split arbitrarily.
    Data(Bytes),
    /// The connection is gone. `had_error` is set when an error caused it.
    Close { had_error: bool },
    /// The transport failed. Usually followed by `Close`.
    Error(TransportError),
}

/// Byte-oriented connection primitive.
///
/// All methods are non-blocking; outcomes are reported as [`TransportEvent`]s.
pub trait RawTransport {
    /// Dial `host:port`.
    fn connect(&mut self, port: u16, host: &str);

    /// Queue bytes for sending.
    fn write(&mut self, data: Bytes);

    /// Tear the connection down immediately.
    fn destroy(&mut self);

    /// Invoke `on_timeout` after `timeout` of inactivity. `Duration::ZERO` disables.
    fn set_timeout(&mut self, timeout: Duration, on_timeout: Option<TimeoutCallback>);

    /// Enable or disable TCP keep-alive probes.
    fn set_keep_alive(&mut self, enable: bool, initial_delay: Duration);
}

impl<T: RawTransport + ?Sized> RawTransport for Box<T> {
    fn connect(&mut self, port: u16, host: &str) {
        (**self).connect(port, host)
    }

    fn write(&mut self, data: Bytes) {
        (**self).write(data)
    }

    fn destroy(&mut self) {
        (**self).destroy()
    }

    fn set_timeout(&mut self, timeout: Duration, on_timeout: Option<TimeoutCallback>) {
        (**self).set_timeout(timeout, on_timeout)
    }

    fn set_keep_alive(&mut self, enable: bool, initial_delay: Duration) {
        (**self).set_keep_alive(enable, initial_delay)
    }
}

/// Event emitted by a [`DuplexSocket`] to its consumer.
#[derive(Debug)]
pub enum SocketEvent<E> {
    /// The socket is connected and ready for application data.
    Connect,
    /// New data is available through [`DuplexSocket::read`].
    Readable,
    /// The socket is closed. Emitted at most once.
    Close { had_error: bool },
    /// A fatal error occurred.
    Error(E),
}

impl<E> SocketEvent<E> {
    /// Short name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Readable => "readable",
            Self::Close { .. } => "close",
            Self::Error(_) => "error",
        }
    }
}

/// Read/write/event capability interface of a connected byte stream.
///
/// Reads are pull-based and never block; the socket signals new data with
/// [`SocketEvent::Readable`] and the consumer pulls it with [`read`](Self::read).
pub trait DuplexSocket {
    /// Error type surfaced through results and [`SocketEvent::Error`].
    type Error: std::error::Error + Send + Sync + 'static;

    /// Dial `host:port`. `on_connect` runs once when the socket is connected.
    fn connect(
        &mut self,
        port: u16,
        host: &str,
        on_connect: Option<ConnectCallback>,
    ) -> Result<(), Self::Error>;

    /// Feed an event reported by the underlying raw transport.
    fn on_transport_event(&mut self, event: TransportEvent);

    /// Take up to `max` buffered bytes. Returns an empty buffer if none are available.
    fn read(&mut self, max: usize) -> Bytes;

    /// Send `data`. Returns the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Next pending event, if any.
    fn poll_event(&mut self) -> Option<SocketEvent<Self::Error>>;

    /// Tear the socket down. Idempotent.
    fn destroy(&mut self);

    /// Pass-through to [`RawTransport::set_timeout`].
    fn set_timeout(&mut self, timeout: Duration, on_timeout: Option<TimeoutCallback>);

    /// Pass-through to [`RawTransport::set_keep_alive`].
    fn set_keep_alive(&mut self, enable: bool, initial_delay: Duration);
}
