//! Tokio-backed TCP transport.
//!
//! `TcpTransport` is the command side: it is owned by the socket layer and
//! never blocks. Each `connect` spawns one task that owns the `TcpStream`,
//! executes queued commands in order and reports [`TransportEvent`]s on the
//! channel handed out by [`TcpTransport::new`].

use std::ops::ControlFlow;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use tlsock_config::TcpConfig;
use tlsock_core::defaults::DEFAULT_TRANSPORT_READ_BUFFER;

use crate::error::TransportError;
use crate::{RawTransport, TimeoutCallback, TransportEvent};

enum Command {
    Write(Bytes),
    Destroy,
    SetTimeout(Duration, Option<TimeoutCallback>),
    SetKeepAlive(bool, Duration),
}

/// Raw TCP transport driven by a background tokio task.
pub struct TcpTransport {
    config: TcpConfig,
    commands: mpsc::UnboundedSender<Command>,
    /// Receiving end of `commands`, handed to the connection task on `connect`.
    pending: Option<mpsc::UnboundedReceiver<Command>>,
    events: mpsc::UnboundedSender<TransportEvent>,
    destroyed: bool,
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("config", &self.config)
            .field("connected", &self.pending.is_none())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

impl TcpTransport {
    /// Create an unconnected transport and the receiver for its events.
    pub fn new(config: TcpConfig) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (commands, pending) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();
        let transport = Self {
            config,
            commands,
            pending: Some(pending),
            events,
            destroyed: false,
        };
        (transport, events_rx)
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            trace!("transport task has exited, command dropped");
        }
    }
}

impl RawTransport for TcpTransport {
    fn connect(&mut self, port: u16, host: &str) {
        if self.destroyed {
            debug!(host, port, "connect on destroyed transport ignored");
            return;
        }
        let Some(commands) = self.pending.take() else {
            warn!(host, port, "transport already connected");
            return;
        };
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                let _ = self.events.send(TransportEvent::Error(TransportError::NoRuntime));
                let _ = self.events.send(TransportEvent::Close { had_error: true });
                return;
            }
        };
        debug!(host, port, "dialing");
        handle.spawn(run_connection(
            host.to_string(),
            port,
            self.config.clone(),
            commands,
            self.events.clone(),
        ));
    }

    fn write(&mut self, data: Bytes) {
        if self.destroyed {
            trace!(len = data.len(), "write on destroyed transport dropped");
            return;
        }
        self.send(Command::Write(data));
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        if self.pending.take().is_some() {
            // Never dialed: there is no task to report the close.
            let _ = self.events.send(TransportEvent::Close { had_error: false });
        } else {
            self.send(Command::Destroy);
        }
    }

    fn set_timeout(&mut self, timeout: Duration, on_timeout: Option<TimeoutCallback>) {
        self.send(Command::SetTimeout(timeout, on_timeout));
    }

    fn set_keep_alive(&mut self, enable: bool, initial_delay: Duration) {
        self.send(Command::SetKeepAlive(enable, initial_delay));
    }
}

async fn run_connection(
    host: String,
    port: u16,
    config: TcpConfig,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    // Commands other than Destroy wait until the dial finishes.
    let mut backlog = Vec::new();
    let dial = TcpStream::connect((host.as_str(), port));
    tokio::pin!(dial);

    let stream = loop {
        tokio::select! {
            res = &mut dial => match res {
                Ok(stream) => break stream,
                Err(e) => {
                    debug!(host = %host, port, error = %e, "connect failed");
                    let _ = events.send(TransportEvent::Error(TransportError::Connect {
                        addr: format!("{host}:{port}"),
                        source: e,
                    }));
                    let _ = events.send(TransportEvent::Close { had_error: true });
                    return;
                }
            },
            cmd = commands.recv() => match cmd {
                Some(Command::Destroy) | None => {
                    debug!(host = %host, port, "dial cancelled");
                    let _ = events.send(TransportEvent::Close { had_error: false });
                    return;
                }
                Some(cmd) => backlog.push(cmd),
            },
        }
    };

    if let Err(e) = apply_tcp_options(&stream, &config) {
        warn!(error = %e, "failed to apply TCP options");
    }
    debug!(host = %host, port, "connected");
    let _ = events.send(TransportEvent::Connect);

    let (reader, writer) = stream.into_split();
    let mut conn = Connection {
        reader,
        writer,
        events,
        idle: None,
        on_timeout: None,
        deadline: Instant::now(),
    };
    for cmd in backlog {
        if conn.apply(cmd).await.is_break() {
            return;
        }
    }
    conn.run(commands).await;
}

struct Connection {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    events: mpsc::UnboundedSender<TransportEvent>,
    idle: Option<Duration>,
    on_timeout: Option<TimeoutCallback>,
    deadline: Instant,
}

impl Connection {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut buf = BytesMut::with_capacity(DEFAULT_TRANSPORT_READ_BUFFER);
        loop {
            buf.reserve(DEFAULT_TRANSPORT_READ_BUFFER);
            let deadline = self.deadline;
            let idle_armed = self.idle.is_some();

            tokio::select! {
                res = self.reader.read_buf(&mut buf) => match res {
                    Ok(0) => {
                        debug!("peer closed connection");
                        self.close(false);
                        return;
                    }
                    Ok(n) => {
                        trace!(bytes = n, "read");
                        self.touch();
                        let _ = self.events.send(TransportEvent::Data(buf.split().freeze()));
                    }
                    Err(e) => {
                        self.fail(e);
                        return;
                    }
                },
                cmd = commands.recv() => match cmd {
                    Some(cmd) => {
                        if self.apply(cmd).await.is_break() {
                            return;
                        }
                    }
                    None => {
                        debug!("transport owner dropped, closing");
                        self.close(false);
                        return;
                    }
                },
                _ = tokio::time::sleep_until(deadline), if idle_armed => {
                    trace!("idle timeout");
                    if let Some(on_timeout) = self.on_timeout.as_mut() {
                        on_timeout();
                    }
                    self.touch();
                }
            }
        }
    }

    async fn apply(&mut self, cmd: Command) -> ControlFlow<()> {
        match cmd {
            Command::Write(data) => {
                self.touch();
                if let Err(e) = self.writer.write_all(&data).await {
                    self.fail(e);
                    return ControlFlow::Break(());
                }
                trace!(bytes = data.len(), "wrote");
            }
            Command::Destroy => {
                debug!("transport destroyed");
                self.close(false);
                return ControlFlow::Break(());
            }
            Command::SetTimeout(timeout, on_timeout) => {
                if timeout.is_zero() {
                    self.idle = None;
                    self.on_timeout = None;
                } else {
                    self.idle = Some(timeout);
                    self.on_timeout = on_timeout;
                    self.touch();
                }
            }
            Command::SetKeepAlive(enable, initial_delay) => {
                if let Err(e) = set_keep_alive(self.reader.as_ref(), enable, initial_delay) {
                    warn!(error = %e, "failed to set keep-alive");
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn touch(&mut self) {
        if let Some(idle) = self.idle {
            self.deadline = Instant::now() + idle;
        }
    }

    fn fail(&self, error: std::io::Error) {
        debug!(error = %error, "transport error");
        let _ = self.events.send(TransportEvent::Error(error.into()));
        self.close(true);
    }

    fn close(&self, had_error: bool) {
        let _ = self.events.send(TransportEvent::Close { had_error });
    }
}

/// Apply TCP socket options.
fn apply_tcp_options(stream: &TcpStream, config: &TcpConfig) -> std::io::Result<()> {
    stream.set_nodelay(config.no_delay)?;

    if config.keepalive_secs > 0 {
        set_keep_alive(stream, true, Duration::from_secs(config.keepalive_secs))?;
    }

    Ok(())
}

fn set_keep_alive(stream: &TcpStream, enable: bool, initial_delay: Duration) -> std::io::Result<()> {
    let sock = socket2::SockRef::from(stream);
    if !enable {
        return sock.set_keepalive(false);
    }
    let mut keepalive = socket2::TcpKeepalive::new();
    if !initial_delay.is_zero() {
        keepalive = keepalive.with_time(initial_delay);
    }
    sock.set_tcp_keepalive(&keepalive)
}
