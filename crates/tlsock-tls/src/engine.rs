//! TLS engine seam.
//!
//! An engine performs the client side of the handshake and the record
//! layer. It never touches the network: ciphertext goes in through
//! [`TlsEngine::process`] and comes out as [`EngineEvent::TlsData`].
//! Every operation appends what happened, in order, to an event list
//! owned by the caller, so nothing the engine reports can re-enter it.

use std::io::{Read, Write};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use rustls::client::{Resumption, WebPkiServerVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection};
use tracing::trace;

use crate::anchors::TrustAnchors;
use crate::error::EngineError;
use crate::verify::HostnameVerifier;

/// Something the engine reports while processing input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The handshake completed and the peer's identity was accepted.
    Connected,
    /// Ciphertext ready to go to the transport.
    TlsData(Bytes),
    /// Plaintext was newly decrypted and can be read.
    DataReady,
    /// The peer sent `close_notify`.
    Closed,
}

/// Client-side TLS handshake and record engine.
pub trait TlsEngine {
    /// Start the handshake.
    fn handshake(&mut self, out: &mut Vec<EngineEvent>) -> Result<(), EngineError>;

    /// Feed ciphertext received from the peer. Partial records are buffered.
    fn process(&mut self, ciphertext: &[u8], out: &mut Vec<EngineEvent>)
    -> Result<(), EngineError>;

    /// Queue plaintext for the peer. Plaintext given before the handshake
    /// completes is held and sent, in order, once it does.
    fn prepare(&mut self, plaintext: &[u8], out: &mut Vec<EngineEvent>)
    -> Result<(), EngineError>;

    /// Send `close_notify`.
    fn close(&mut self, out: &mut Vec<EngineEvent>) -> Result<(), EngineError>;

    /// Take up to `max` bytes of decrypted plaintext.
    fn read_plaintext(&mut self, max: usize) -> Bytes;

    /// Protocol agreed through ALPN, once established.
    fn alpn_protocol(&self) -> Option<&[u8]> {
        None
    }
}

/// Creates one engine session per connection.
pub trait EngineFactory {
    type Engine: TlsEngine;

    /// Build a client session for `hostname`, trusting `anchors`.
    fn create(&self, hostname: &str, anchors: &TrustAnchors) -> Result<Self::Engine, EngineError>;
}

/// Builds [`RustlsEngine`]s.
#[derive(Debug, Clone, Default)]
pub struct RustlsEngineFactory {
    alpn: Vec<Vec<u8>>,
    provider: Option<Arc<CryptoProvider>>,
}

impl RustlsEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer these protocols through ALPN, in preference order.
    pub fn with_alpn<I, P>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Vec<u8>>,
    {
        self.alpn = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// Use `provider` instead of the process default.
    pub fn with_provider(mut self, provider: Arc<CryptoProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    fn provider(&self) -> Arc<CryptoProvider> {
        self.provider
            .clone()
            .or_else(|| CryptoProvider::get_default().cloned())
            .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
    }
}

impl EngineFactory for RustlsEngineFactory {
    type Engine = RustlsEngine;

    fn create(&self, hostname: &str, anchors: &TrustAnchors) -> Result<RustlsEngine, EngineError> {
        let server_name = ServerName::try_from(hostname.to_string())
            .map_err(|e| EngineError::config(format!("invalid server name {hostname:?}: {e}")))?;
        let provider = self.provider();

        let webpki = WebPkiServerVerifier::builder_with_provider(anchors.roots(), provider.clone())
            .build()
            .map_err(|e| EngineError::config(format!("failed to build verifier: {e}")))?;
        let verifier = Arc::new(HostnameVerifier::new(webpki, hostname));

        let mut config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| EngineError::from_rustls(e, false))?
            .dangerous()
            .with_custom_certificate_verifier(verifier.clone())
            .with_no_client_auth();
        config.alpn_protocols = self.alpn.clone();
        config.resumption = Resumption::disabled();

        let conn = ClientConnection::new(Arc::new(config), server_name)
            .map_err(|e| EngineError::from_rustls(e, false))?;
        Ok(RustlsEngine::new(conn, verifier))
    }
}

/// [`TlsEngine`] backed by a `rustls::ClientConnection`.
pub struct RustlsEngine {
    conn: ClientConnection,
    verifier: Arc<HostnameVerifier>,
    /// Decrypted plaintext not yet read by the consumer.
    inbound: BytesMut,
    /// Set by `handshake`; ciphertext is held back until then.
    started: bool,
    connected: bool,
    peer_closed: bool,
}

impl std::fmt::Debug for RustlsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustlsEngine")
            .field("hostname", &self.verifier.hostname())
            .field("started", &self.started)
            .field("connected", &self.connected)
            .field("peer_closed", &self.peer_closed)
            .field("buffered", &self.inbound.len())
            .finish()
    }
}

impl RustlsEngine {
    fn new(mut conn: ClientConnection, verifier: Arc<HostnameVerifier>) -> Self {
        // Writes are never refused; flow control belongs to the transport.
        conn.set_buffer_limit(None);
        Self {
            conn,
            verifier,
            inbound: BytesMut::new(),
            started: false,
            connected: false,
            peer_closed: false,
        }
    }

    /// Move all pending ciphertext out of rustls as one `TlsData` event.
    fn flush(&mut self, out: &mut Vec<EngineEvent>) -> Result<(), EngineError> {
        let mut buf = Vec::new();
        while self.conn.wants_write() {
            self.conn.write_tls(&mut buf).map_err(EngineError::io)?;
        }
        if !buf.is_empty() {
            trace!(bytes = buf.len(), "ciphertext ready");
            out.push(EngineEvent::TlsData(buf.into()));
        }
        Ok(())
    }

    /// Drain decrypted plaintext from rustls into `inbound`. Returns the byte count.
    fn drain_plaintext(&mut self) -> usize {
        let mut total = 0;
        let mut chunk = [0u8; 4096];
        loop {
            match self.conn.reader().read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    self.inbound.extend_from_slice(&chunk[..n]);
                    total += n;
                }
            }
        }
        total
    }

    fn fail(&mut self, error: rustls::Error, out: &mut Vec<EngineEvent>) -> EngineError {
        // rustls queues the alert describing the failure; it still has to go out.
        let _ = self.flush(out);
        let err = EngineError::from_rustls(error, self.connected);
        match self.verifier.take_rejection() {
            Some(message) => err.with_message(message),
            None => err,
        }
    }
}

impl TlsEngine for RustlsEngine {
    fn handshake(&mut self, out: &mut Vec<EngineEvent>) -> Result<(), EngineError> {
        self.started = true;
        self.flush(out)
    }

    fn process(
        &mut self,
        ciphertext: &[u8],
        out: &mut Vec<EngineEvent>,
    ) -> Result<(), EngineError> {
        let mut input = ciphertext;
        while !input.is_empty() {
            if self.conn.read_tls(&mut input).map_err(EngineError::io)? == 0 {
                break;
            }
            let state = match self.conn.process_new_packets() {
                Ok(state) => state,
                Err(e) => return Err(self.fail(e, out)),
            };
            self.flush(out)?;

            if !self.connected && !self.conn.is_handshaking() {
                self.connected = true;
                out.push(EngineEvent::Connected);
                // Plaintext queued during the handshake is now encrypted.
                self.flush(out)?;
            }
            if state.plaintext_bytes_to_read() > 0 && self.drain_plaintext() > 0 {
                out.push(EngineEvent::DataReady);
            }
            if state.peer_has_closed() && !self.peer_closed {
                self.peer_closed = true;
                out.push(EngineEvent::Closed);
            }
        }
        Ok(())
    }

    fn prepare(
        &mut self,
        plaintext: &[u8],
        out: &mut Vec<EngineEvent>,
    ) -> Result<(), EngineError> {
        self.conn
            .writer()
            .write_all(plaintext)
            .map_err(EngineError::io)?;
        if self.started {
            self.flush(out)?;
        }
        Ok(())
    }

    fn close(&mut self, out: &mut Vec<EngineEvent>) -> Result<(), EngineError> {
        self.conn.send_close_notify();
        if self.started {
            self.flush(out)?;
        }
        Ok(())
    }

    fn read_plaintext(&mut self, max: usize) -> Bytes {
        let n = max.min(self.inbound.len());
        self.inbound.split_to(n).freeze()
    }

    fn alpn_protocol(&self) -> Option<&[u8]> {
        self.conn.alpn_protocol()
    }
}
