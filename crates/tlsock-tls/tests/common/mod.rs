#![allow(dead_code)]
//! Shared fixtures: a throwaway PKI, a recording transport and an
//! in-memory TLS server peer.

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ServerConfig, ServerConnection};
use tlsock_tls::{EngineFactory, TlsSocket, TrustAnchors};
use tlsock_transport::{RawTransport, SocketEvent, TimeoutCallback, TransportEvent};

#[ctor::ctor]
fn init_crypto() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// A root CA able to issue server certificates.
pub struct TestCa {
    cert: rcgen::Certificate,
    key: KeyPair,
}

impl TestCa {
    pub fn new(name: &str) -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name = DistinguishedName::new();
        params.distinguished_name.push(DnType::CommonName, name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let cert = params.self_signed(&key).unwrap();
        Self { cert, key }
    }

    pub fn der(&self) -> CertificateDer<'static> {
        self.cert.der().clone()
    }

    pub fn anchors(&self) -> TrustAnchors {
        TrustAnchors::from_der([self.der()]).unwrap()
    }

    /// Leaf for `san` whose subject common name is `cn`.
    pub fn issue(&self, san: &str, cn: &str) -> (CertificateDer<'static>, PrivateKeyDer<'static>) {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec![san.to_string()]).unwrap();
        params.distinguished_name = DistinguishedName::new();
        params.distinguished_name.push(DnType::CommonName, cn);
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        let cert = params.signed_by(&key, &self.cert, &self.key).unwrap();
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der()));
        (cert.der().clone(), key)
    }

    pub fn server_config(&self, san: &str, cn: &str) -> ServerConfig {
        let (leaf, key) = self.issue(san, cn);
        ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![leaf, self.der()], key)
            .unwrap()
    }
}

/// Raw transport that records every command.
#[derive(Debug, Default)]
pub struct MockTransport {
    pub connects: Vec<(u16, String)>,
    pub written: Vec<u8>,
    pub writes: usize,
    pub destroyed: usize,
    pub timeouts: Vec<(Duration, bool)>,
    pub keep_alive: Vec<(bool, Duration)>,
}

impl MockTransport {
    pub fn take_written(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.written)
    }
}

impl RawTransport for MockTransport {
    fn connect(&mut self, port: u16, host: &str) {
        self.connects.push((port, host.to_string()));
    }

    fn write(&mut self, data: Bytes) {
        self.writes += 1;
        self.written.extend_from_slice(&data);
    }

    fn destroy(&mut self) {
        self.destroyed += 1;
    }

    fn set_timeout(&mut self, timeout: Duration, on_timeout: Option<TimeoutCallback>) {
        self.timeouts.push((timeout, on_timeout.is_some()));
    }

    fn set_keep_alive(&mut self, enable: bool, initial_delay: Duration) {
        self.keep_alive.push((enable, initial_delay));
    }
}

/// TLS server on the other end of the mock transport.
pub struct Peer {
    pub conn: ServerConnection,
    pub error: Option<rustls::Error>,
    pub closed: bool,
    received: Vec<u8>,
}

impl Peer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            conn: ServerConnection::new(Arc::new(config)).unwrap(),
            error: None,
            closed: false,
            received: Vec::new(),
        }
    }

    pub fn receive(&mut self, mut data: &[u8]) {
        while !data.is_empty() && self.error.is_none() {
            if self.conn.read_tls(&mut data).unwrap() == 0 {
                break;
            }
            match self.conn.process_new_packets() {
                Ok(state) => self.closed |= state.peer_has_closed(),
                Err(e) => {
                    self.error = Some(e);
                    break;
                }
            }
            let mut buf = [0u8; 4096];
            while let Ok(n) = self.conn.reader().read(&mut buf) {
                if n == 0 {
                    break;
                }
                self.received.extend_from_slice(&buf[..n]);
            }
        }
    }

    pub fn send(&mut self, data: &[u8]) {
        self.conn.writer().write_all(data).unwrap();
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        while self.conn.wants_write() {
            self.conn.write_tls(&mut out).unwrap();
        }
        out
    }

    pub fn take_received(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.received)
    }
}

/// Shuttle bytes both ways until neither side has anything to say.
pub fn pump<F: EngineFactory>(socket: &mut TlsSocket<MockTransport, F>, peer: &mut Peer) {
    pump_chunked(socket, peer, usize::MAX);
}

/// Like [`pump`], delivering server bytes to the socket in `chunk`-sized pieces.
pub fn pump_chunked<F: EngineFactory>(
    socket: &mut TlsSocket<MockTransport, F>,
    peer: &mut Peer,
    chunk: usize,
) {
    for _ in 0..64 {
        let to_peer = socket.transport_mut().take_written();
        peer.receive(&to_peer);
        let to_client = peer.take_output();
        if to_peer.is_empty() && to_client.is_empty() {
            return;
        }
        for piece in to_client.chunks(chunk) {
            socket.handle_transport_event(TransportEvent::Data(Bytes::copy_from_slice(piece)));
        }
    }
    panic!("pump did not settle");
}

/// Names of all pending socket events.
pub fn drain_events<T: RawTransport, F: EngineFactory>(
    socket: &mut TlsSocket<T, F>,
) -> Vec<&'static str> {
    std::iter::from_fn(|| socket.poll_event())
        .map(|event| event.name())
        .collect()
}

/// Drain events, returning the first error if any.
pub fn first_error<T: RawTransport, F: EngineFactory>(
    socket: &mut TlsSocket<T, F>,
) -> Option<tlsock_tls::TlsSocketError> {
    std::iter::from_fn(|| socket.poll_event()).find_map(|event| match event {
        SocketEvent::Error(e) => Some(e),
        _ => None,
    })
}

/// Read everything currently buffered, `max` bytes at a time.
pub fn read_all<T: RawTransport, F: EngineFactory>(
    socket: &mut TlsSocket<T, F>,
    max: usize,
) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let chunk = socket.read(max);
        if chunk.is_empty() {
            return out;
        }
        assert!(chunk.len() <= max);
        out.extend_from_slice(&chunk);
    }
}
