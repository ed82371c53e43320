//! One client session: dial, handshake, send the request, stream the reply.

use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tlsock_config::{Config, TlsConfig};
use tlsock_tls::{RustlsEngineFactory, TlsSocket, TlsSocketError, TrustAnchors};
use tlsock_transport::{SocketEvent, TcpTransport};

use crate::error::ClientError;

/// What happened during a finished session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub bytes_sent: usize,
    pub bytes_received: usize,
    /// Protocol agreed through ALPN.
    pub alpn: Option<String>,
    /// The session ended because the shutdown token fired.
    pub cancelled: bool,
}

/// Trust anchors from the configured CA file, or the bundled web roots.
pub fn load_anchors(tls: &TlsConfig) -> Result<TrustAnchors, ClientError> {
    match tls.ca.as_deref() {
        Some(path) => Ok(TrustAnchors::from_pem_file(path)?),
        None => Ok(TrustAnchors::webpki_roots()),
    }
}

/// Expand `\r`, `\n`, `\t` and `\\` so requests can be given on the command line.
pub fn unescape_request(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Run a session against `config.connect`, trusting `anchors`, and copy the
/// decrypted response to `output` until the peer closes.
///
/// Must run inside a tokio runtime; the TCP transport spawns its connection
/// task on it.
pub async fn run_session<W>(
    config: &Config,
    anchors: TrustAnchors,
    output: &mut W,
    shutdown: CancellationToken,
) -> Result<SessionSummary, ClientError>
where
    W: AsyncWrite + Unpin,
{
    let connect = &config.connect;
    let factory = RustlsEngineFactory::new().with_alpn(config.tls.alpn.clone());
    let (transport, mut transport_events) = TcpTransport::new(config.tcp.clone());
    let mut socket = TlsSocket::with_engine_factory(transport, anchors, factory);

    let (idle_tx, mut idle_rx) = mpsc::unbounded_channel();
    let idle_timeout = Duration::from_secs(connect.idle_timeout_secs);
    if !idle_timeout.is_zero() {
        socket.set_timeout(
            idle_timeout,
            Some(Box::new(move || {
                let _ = idle_tx.send(());
            })),
        );
    }

    let handshake_timeout = Duration::from_secs(connect.handshake_timeout_secs);
    let handshake_deadline = Instant::now() + handshake_timeout;
    let host = connect.host.clone();
    socket.connect(
        connect.port,
        &connect.host,
        Some(Box::new(move || debug!(host = %host, "connect listener fired"))),
    )?;

    let request = connect.request.as_deref().map(unescape_request);
    let mut summary = SessionSummary::default();
    let mut established = false;
    let mut failure: Option<TlsSocketError> = None;

    loop {
        while let Some(event) = socket.poll_event() {
            match event {
                SocketEvent::Connect => {
                    established = true;
                    summary.alpn = socket
                        .alpn_protocol()
                        .map(|p| String::from_utf8_lossy(p).into_owned());
                    info!(
                        host = %connect.host,
                        port = connect.port,
                        alpn = ?summary.alpn,
                        "secure connection established"
                    );
                    if let Some(request) = &request {
                        summary.bytes_sent += socket.write(request.as_bytes())?;
                    }
                }
                SocketEvent::Readable => {
                    summary.bytes_received +=
                        copy_readable(&mut socket, output, connect.read_chunk_size).await?;
                }
                SocketEvent::Error(e) => {
                    warn!(error = %e, error_kind = e.kind(), "socket error");
                    socket.destroy();
                    failure.get_or_insert(e);
                }
                SocketEvent::Close { had_error } => {
                    summary.bytes_received +=
                        copy_readable(&mut socket, output, connect.read_chunk_size).await?;
                    output.flush().await?;
                    socket.destroy();
                    debug!(
                        had_error,
                        sent = summary.bytes_sent,
                        received = summary.bytes_received,
                        "session closed"
                    );
                    return match failure {
                        Some(e) => Err(e.into()),
                        None => Ok(summary),
                    };
                }
            }
        }

        tokio::select! {
            event = transport_events.recv() => match event {
                Some(event) => socket.handle_transport_event(event),
                None => socket.destroy(),
            },
            Some(()) = idle_rx.recv() => {
                warn!(host = %connect.host, timeout = ?idle_timeout, "idle timeout");
                socket.destroy();
                return Err(ClientError::IdleTimeout(idle_timeout));
            }
            _ = tokio::time::sleep_until(handshake_deadline), if !established => {
                warn!(host = %connect.host, timeout = ?handshake_timeout, "TLS handshake timed out");
                socket.destroy();
                return Err(ClientError::HandshakeTimeout(handshake_timeout));
            }
            _ = shutdown.cancelled() => {
                info!("session cancelled");
                if established
                    && let Err(e) = socket.end()
                {
                    debug!(error = %e, "close_notify not sent");
                }
                socket.destroy();
                output.flush().await?;
                summary.cancelled = true;
                return Ok(summary);
            }
        }
    }
}

async fn copy_readable<T, W>(
    socket: &mut TlsSocket<T, RustlsEngineFactory>,
    output: &mut W,
    chunk_size: usize,
) -> Result<usize, ClientError>
where
    T: tlsock_transport::RawTransport,
    W: AsyncWrite + Unpin,
{
    let mut total = 0;
    loop {
        let chunk = socket.read(chunk_size);
        if chunk.is_empty() {
            return Ok(total);
        }
        output.write_all(&chunk).await?;
        total += chunk.len();
    }
}
