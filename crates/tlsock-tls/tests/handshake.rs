#![allow(clippy::tests_outside_test_module)]
mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use common::{MockTransport, Peer, TestCa, drain_events, first_error, init_tracing, pump};
use rustls::AlertDescription;
use tlsock_tls::{EngineErrorKind, LifecycleState, RustlsEngineFactory, TlsSocket, TlsSocketError};
use tlsock_transport::TransportEvent;

fn connect(ca: &TestCa) -> (TlsSocket<MockTransport>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut socket = TlsSocket::new(MockTransport::default(), ca.anchors());
    socket
        .connect(
            443,
            "example.com",
            Some(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();
    socket.handle_transport_event(TransportEvent::Connect);
    (socket, calls)
}

fn assert_certificate_failure(socket: &mut TlsSocket<MockTransport>, alert: AlertDescription) {
    assert_eq!(socket.state(), LifecycleState::Failed);
    assert_eq!(socket.transport().destroyed, 1);
    let events = std::iter::from_fn(|| socket.poll_event()).collect::<Vec<_>>();
    assert_eq!(events.len(), 1, "events: {events:?}");
    match &events[0] {
        tlsock_transport::SocketEvent::Error(TlsSocketError::Tls(e)) => {
            assert_eq!(e.kind(), EngineErrorKind::Certificate);
            assert_eq!(e.alert(), Some(alert));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn matching_common_name_establishes_once() {
    init_tracing();
    let ca = TestCa::new("Test Root");
    let mut peer = Peer::new(ca.server_config("example.com", "example.com"));
    let (mut socket, calls) = connect(&ca);

    assert_eq!(socket.transport().connects, [(443, "example.com".to_string())]);
    assert_eq!(socket.state(), LifecycleState::Handshaking);
    assert!(!socket.transport().written.is_empty(), "ClientHello not sent");

    pump(&mut socket, &mut peer);

    assert_eq!(socket.state(), LifecycleState::Established);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(drain_events(&mut socket), ["connect"]);
    assert!(peer.error.is_none());
    assert!(!peer.conn.is_handshaking());
    assert_eq!(socket.transport().destroyed, 0);
}

#[test]
fn http_request_is_encrypted_and_forwarded() {
    init_tracing();
    let request = b"GET / HTTP/1.0\r\n\r\n";
    let ca = TestCa::new("Test Root");
    let mut peer = Peer::new(ca.server_config("example.com", "example.com"));
    let (mut socket, _) = connect(&ca);
    pump(&mut socket, &mut peer);
    assert_eq!(drain_events(&mut socket), ["connect"]);

    assert_eq!(socket.write(request).unwrap(), request.len());
    let ciphertext = socket.transport_mut().take_written();
    assert!(!ciphertext.is_empty());
    assert!(
        !ciphertext.windows(request.len()).any(|w| w == request),
        "request leaked in plaintext"
    );

    peer.receive(&ciphertext);
    assert_eq!(peer.take_received(), request);

    peer.send(b"HTTP/1.0 200 OK\r\n\r\nhello");
    let response = peer.take_output();
    socket.handle_transport_event(TransportEvent::Data(Bytes::from(response)));
    assert_eq!(drain_events(&mut socket), ["readable"]);
    assert_eq!(
        common::read_all(&mut socket, 1024),
        b"HTTP/1.0 200 OK\r\n\r\nhello"
    );
}

#[test]
fn common_name_mismatch_is_fatal() {
    init_tracing();
    let ca = TestCa::new("Test Root");
    // The chain is valid for example.com; only the subject CN is wrong.
    let mut peer = Peer::new(ca.server_config("example.com", "attacker.com"));
    let (mut socket, calls) = connect(&ca);

    pump(&mut socket, &mut peer);

    assert_certificate_failure(&mut socket, AlertDescription::BadCertificate);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        peer.error,
        Some(rustls::Error::AlertReceived(AlertDescription::BadCertificate))
    );
    assert!(matches!(socket.write(b"GET /"), Err(TlsSocketError::Closed)));
}

#[test]
fn common_name_without_matching_san_is_rejected() {
    init_tracing();
    let ca = TestCa::new("Test Root");
    // The CN names the host but the SAN does not.
    let mut peer = Peer::new(ca.server_config("other.example", "example.com"));
    let (mut socket, calls) = connect(&ca);

    pump(&mut socket, &mut peer);

    assert_certificate_failure(&mut socket, AlertDescription::BadCertificate);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn mismatch_error_names_both_sides() {
    let ca = TestCa::new("Test Root");
    let mut peer = Peer::new(ca.server_config("example.com", "attacker.com"));
    let (mut socket, _) = connect(&ca);
    pump(&mut socket, &mut peer);

    match first_error(&mut socket) {
        Some(TlsSocketError::Tls(e)) => {
            assert!(e.message().contains("attacker.com"), "{e}");
            assert!(e.message().contains("example.com"), "{e}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn san_mismatch_is_rejected_by_chain_validation() {
    init_tracing();
    let ca = TestCa::new("Test Root");
    let mut peer = Peer::new(ca.server_config("attacker.com", "example.com"));
    let (mut socket, calls) = connect(&ca);

    pump(&mut socket, &mut peer);

    assert_certificate_failure(&mut socket, AlertDescription::BadCertificate);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn untrusted_root_is_rejected() {
    init_tracing();
    let trusted = TestCa::new("Trusted Root");
    let rogue = TestCa::new("Rogue Root");
    let mut peer = Peer::new(rogue.server_config("example.com", "example.com"));
    let (mut socket, _) = connect(&trusted);

    pump(&mut socket, &mut peer);

    assert_certificate_failure(&mut socket, AlertDescription::UnknownCA);
}

#[test]
fn transport_close_during_handshake() {
    init_tracing();
    let ca = TestCa::new("Test Root");
    let mut peer = Peer::new(ca.server_config("example.com", "example.com"));
    let (mut socket, calls) = connect(&ca);

    peer.receive(&socket.transport_mut().take_written());
    let server_flight = peer.take_output();

    socket.handle_transport_event(TransportEvent::Close { had_error: false });
    assert_eq!(socket.state(), LifecycleState::Closed);
    assert_eq!(drain_events(&mut socket), ["close"]);

    // Late handshake bytes change nothing.
    socket.handle_transport_event(TransportEvent::Data(Bytes::from(server_flight)));
    assert_eq!(socket.state(), LifecycleState::Closed);
    assert!(socket.poll_event().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(matches!(socket.write(b"x"), Err(TlsSocketError::Closed)));
}

#[test]
fn alpn_protocol_is_negotiated() {
    init_tracing();
    let ca = TestCa::new("Test Root");
    let mut config = ca.server_config("example.com", "example.com");
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    let mut peer = Peer::new(config);

    let factory = RustlsEngineFactory::new().with_alpn(["h2", "http/1.1"]);
    let mut socket = TlsSocket::with_engine_factory(MockTransport::default(), ca.anchors(), factory);
    socket.connect(443, "example.com", None).unwrap();
    assert!(socket.alpn_protocol().is_none());
    socket.handle_transport_event(TransportEvent::Connect);
    pump(&mut socket, &mut peer);

    assert_eq!(socket.state(), LifecycleState::Established);
    assert_eq!(socket.alpn_protocol(), Some(&b"http/1.1"[..]));
}
