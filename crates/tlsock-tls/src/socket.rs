//! TLS duplex socket.
//!
//! [`TlsSocket`] owns one raw transport and, once connected, one engine
//! session. The owner pushes transport events in with
//! [`handle_transport_event`](TlsSocket::handle_transport_event) and pulls
//! socket events out with [`poll_event`](TlsSocket::poll_event). Nothing here
//! blocks or spawns.
//!
//! Lifecycle:
//!
//! ```text
//! Unconnected -connect-> Connecting -transport Connect-> Handshaking
//!     -engine Connected-> Established -close-> Closed
//! any engine error -> Failed (transport destroyed)
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use rustls::pki_types::ServerName;
use tracing::{debug, info, trace, warn};

use tlsock_transport::{
    ConnectCallback, DuplexSocket, RawTransport, SocketEvent, TimeoutCallback, TransportEvent,
};

use crate::anchors::TrustAnchors;
use crate::engine::{EngineEvent, EngineFactory, RustlsEngineFactory, TlsEngine};
use crate::error::{EngineError, TlsSocketError};

/// Where a [`TlsSocket`] is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unconnected,
    Connecting,
    Handshaking,
    Established,
    Closed,
    Failed,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unconnected => "unconnected",
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Established => "established",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }

    /// Closed or failed; no further engine input is accepted.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client TLS over a [`RawTransport`].
pub struct TlsSocket<T, F = RustlsEngineFactory>
where
    F: EngineFactory,
{
    transport: T,
    anchors: TrustAnchors,
    factory: F,
    engine: Option<F::Engine>,
    hostname: Option<String>,
    state: LifecycleState,
    destroyed: bool,
    transport_destroyed: bool,
    close_emitted: bool,
    /// Set by `end`; the write side is shut.
    write_closed: bool,
    on_connect: Option<ConnectCallback>,
    events: VecDeque<SocketEvent<TlsSocketError>>,
    /// Reused engine output buffer.
    scratch: Vec<EngineEvent>,
}

impl<T, F> fmt::Debug for TlsSocket<T, F>
where
    T: fmt::Debug,
    F: EngineFactory,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSocket")
            .field("transport", &self.transport)
            .field("hostname", &self.hostname)
            .field("state", &self.state)
            .field("destroyed", &self.destroyed)
            .field("pending_events", &self.events.len())
            .finish()
    }
}

impl<T: RawTransport> TlsSocket<T> {
    /// Wrap `transport`, verifying peers against `anchors` with the rustls engine.
    pub fn new(transport: T, anchors: TrustAnchors) -> Self {
        Self::with_engine_factory(transport, anchors, RustlsEngineFactory::default())
    }
}

impl<T: RawTransport, F: EngineFactory> TlsSocket<T, F> {
    pub fn with_engine_factory(transport: T, anchors: TrustAnchors, factory: F) -> Self {
        Self {
            transport,
            anchors,
            factory,
            engine: None,
            hostname: None,
            state: LifecycleState::Unconnected,
            destroyed: false,
            transport_destroyed: false,
            close_emitted: false,
            write_closed: false,
            on_connect: None,
            events: VecDeque::new(),
            scratch: Vec::new(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Host given to [`connect`](Self::connect).
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Protocol agreed through ALPN, if any.
    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        self.engine.as_ref().and_then(|e| e.alpn_protocol())
    }

    /// Start a TLS session to `hostname:port`.
    ///
    /// `on_connect` runs once, when the handshake completes and the peer
    /// passed verification.
    pub fn connect(
        &mut self,
        port: u16,
        hostname: &str,
        on_connect: Option<ConnectCallback>,
    ) -> Result<(), TlsSocketError> {
        if self.destroyed {
            return Err(TlsSocketError::Destroyed);
        }
        if self.state != LifecycleState::Unconnected {
            return Err(TlsSocketError::AlreadyConnected);
        }
        if port == 0 {
            return Err(TlsSocketError::InvalidPort(port));
        }
        if hostname.is_empty() || ServerName::try_from(hostname).is_err() {
            return Err(TlsSocketError::InvalidHostname(hostname.to_string()));
        }

        let engine = self.factory.create(hostname, &self.anchors)?;
        self.engine = Some(engine);
        self.hostname = Some(hostname.to_string());
        self.on_connect = on_connect;
        self.set_state(LifecycleState::Connecting);
        debug!(host = hostname, port, "connecting");
        self.transport.connect(port, hostname);
        Ok(())
    }

    /// Feed an event reported by the raw transport.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        if self.destroyed {
            trace!(event = ?event, "event after destroy ignored");
            return;
        }
        match event {
            TransportEvent::Connect => self.on_transport_connect(),
            TransportEvent::Data(data) => self.on_transport_data(&data),
            TransportEvent::Close { had_error } => self.on_transport_close(had_error),
            TransportEvent::Error(error) => {
                if self.state.is_terminal() {
                    trace!(error = %error, state = %self.state, "transport error ignored");
                    return;
                }
                debug!(error = %error, error_kind = error.kind(), "transport error");
                self.events
                    .push_back(SocketEvent::Error(TlsSocketError::Transport(error)));
            }
        }
    }

    /// Take up to `max` bytes of decrypted data. Empty if nothing is buffered.
    pub fn read(&mut self, max: usize) -> Bytes {
        match self.engine.as_mut() {
            Some(engine) if !self.destroyed => engine.read_plaintext(max),
            _ => Bytes::new(),
        }
    }

    /// Encrypt `data` and hand the ciphertext to the transport.
    ///
    /// Data written before the handshake completes is sent, in order, once it
    /// does. An engine failure is queued as an error event and also returned.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, TlsSocketError> {
        self.check_writable()?;
        if data.is_empty() {
            return Ok(0);
        }
        self.drive(|engine, out| engine.prepare(data, out))?;
        Ok(data.len())
    }

    /// Send `close_notify`. The read side stays open until the peer closes;
    /// later writes fail with [`TlsSocketError::Closed`]. Repeated calls do nothing.
    pub fn end(&mut self) -> Result<(), TlsSocketError> {
        self.check_open()?;
        if self.write_closed {
            trace!("write side already ended");
            return Ok(());
        }
        self.write_closed = true;
        debug!(host = ?self.hostname, "sending close_notify");
        self.drive(|engine, out| engine.close(out))?;
        Ok(())
    }

    /// Next pending event, if any.
    pub fn poll_event(&mut self) -> Option<SocketEvent<TlsSocketError>> {
        self.events.pop_front()
    }

    /// Tear everything down. Idempotent.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        debug!(host = ?self.hostname, state = %self.state, "destroying");
        self.destroy_transport();
        self.engine = None;
        self.on_connect = None;
        self.emit_close(false);
        if self.state != LifecycleState::Failed {
            self.set_state(LifecycleState::Closed);
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration, on_timeout: Option<TimeoutCallback>) {
        self.transport.set_timeout(timeout, on_timeout);
    }

    pub fn set_keep_alive(&mut self, enable: bool, initial_delay: Duration) {
        self.transport.set_keep_alive(enable, initial_delay);
    }

    fn check_writable(&self) -> Result<(), TlsSocketError> {
        self.check_open()?;
        if self.write_closed {
            return Err(TlsSocketError::Closed);
        }
        Ok(())
    }

    fn check_open(&self) -> Result<(), TlsSocketError> {
        if self.destroyed {
            return Err(TlsSocketError::Destroyed);
        }
        match self.state {
            LifecycleState::Unconnected => Err(TlsSocketError::NotConnected),
            LifecycleState::Closed | LifecycleState::Failed => Err(TlsSocketError::Closed),
            _ => Ok(()),
        }
    }

    fn on_transport_connect(&mut self) {
        if self.state != LifecycleState::Connecting {
            trace!(state = %self.state, "transport connect ignored");
            return;
        }
        self.set_state(LifecycleState::Handshaking);
        // Failures are queued as events.
        let _ = self.drive(|engine, out| engine.handshake(out));
    }

    fn on_transport_data(&mut self, data: &[u8]) {
        if !matches!(
            self.state,
            LifecycleState::Handshaking | LifecycleState::Established
        ) {
            trace!(state = %self.state, bytes = data.len(), "transport data ignored");
            return;
        }
        let _ = self.drive(|engine, out| engine.process(data, out));
    }

    fn on_transport_close(&mut self, had_error: bool) {
        debug!(host = ?self.hostname, had_error, state = %self.state, "transport closed");
        self.on_connect = None;
        self.emit_close(had_error);
        if self.state != LifecycleState::Failed {
            self.set_state(LifecycleState::Closed);
        }
    }

    /// Run one engine operation and act on everything it reported.
    fn drive<Op>(&mut self, op: Op) -> Result<(), EngineError>
    where
        Op: FnOnce(&mut F::Engine, &mut Vec<EngineEvent>) -> Result<(), EngineError>,
    {
        let Some(engine) = self.engine.as_mut() else {
            return Ok(());
        };
        let mut out = std::mem::take(&mut self.scratch);
        let result = op(engine, &mut out);
        for event in out.drain(..) {
            self.apply(event);
        }
        self.scratch = out;

        if let Err(error) = &result {
            self.fail(error.clone());
        }
        result
    }

    fn apply(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::TlsData(ciphertext) => {
                if !ciphertext.is_empty() && !self.transport_destroyed {
                    self.transport.write(ciphertext);
                }
            }
            EngineEvent::Connected => {
                if self.state != LifecycleState::Handshaking {
                    trace!(state = %self.state, "engine connected ignored");
                    return;
                }
                self.set_state(LifecycleState::Established);
                info!(
                    host = ?self.hostname,
                    alpn = ?self.alpn_protocol().map(String::from_utf8_lossy),
                    "TLS session established"
                );
                if let Some(on_connect) = self.on_connect.take() {
                    on_connect();
                }
                self.events.push_back(SocketEvent::Connect);
            }
            EngineEvent::DataReady => {
                if !self.state.is_terminal() {
                    self.events.push_back(SocketEvent::Readable);
                }
            }
            EngineEvent::Closed => {
                debug!(host = ?self.hostname, "peer sent close_notify");
                self.emit_close(false);
                if self.state != LifecycleState::Failed {
                    self.set_state(LifecycleState::Closed);
                }
            }
        }
    }

    fn fail(&mut self, error: EngineError) {
        warn!(
            host = ?self.hostname,
            state = %self.state,
            error_kind = error.kind().label(),
            alert = ?error.alert(),
            error = %error,
            "TLS failure, destroying transport"
        );
        self.destroy_transport();
        self.on_connect = None;
        self.set_state(LifecycleState::Failed);
        self.events
            .push_back(SocketEvent::Error(TlsSocketError::Tls(error)));
    }

    fn destroy_transport(&mut self) {
        if !self.transport_destroyed {
            self.transport_destroyed = true;
            self.transport.destroy();
        }
    }

    fn emit_close(&mut self, had_error: bool) {
        if self.close_emitted {
            trace!("close already emitted");
            return;
        }
        self.close_emitted = true;
        self.events.push_back(SocketEvent::Close { had_error });
    }

    fn set_state(&mut self, state: LifecycleState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "state transition");
            self.state = state;
        }
    }
}

impl<T: RawTransport, F: EngineFactory> DuplexSocket for TlsSocket<T, F> {
    type Error = TlsSocketError;

    fn connect(
        &mut self,
        port: u16,
        host: &str,
        on_connect: Option<ConnectCallback>,
    ) -> Result<(), TlsSocketError> {
        TlsSocket::connect(self, port, host, on_connect)
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        self.handle_transport_event(event);
    }

    fn read(&mut self, max: usize) -> Bytes {
        TlsSocket::read(self, max)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TlsSocketError> {
        TlsSocket::write(self, data)
    }

    fn poll_event(&mut self) -> Option<SocketEvent<TlsSocketError>> {
        TlsSocket::poll_event(self)
    }

    fn destroy(&mut self) {
        TlsSocket::destroy(self);
    }

    fn set_timeout(&mut self, timeout: Duration, on_timeout: Option<TimeoutCallback>) {
        TlsSocket::set_timeout(self, timeout, on_timeout);
    }

    fn set_keep_alive(&mut self, enable: bool, initial_delay: Duration) {
        TlsSocket::set_keep_alive(self, enable, initial_delay);
    }
}
