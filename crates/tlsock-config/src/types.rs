//! Configuration type definitions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::defaults::*;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub connect: ConnectConfig,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub tcp: TcpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Configuration for `host:port` with every other setting at its default.
    pub fn for_target(host: impl Into<String>, port: u16) -> Self {
        Self {
            connect: ConnectConfig {
                host: host.into(),
                port,
                request: None,
                idle_timeout_secs: default_idle_timeout_secs(),
                handshake_timeout_secs: default_handshake_timeout_secs(),
                read_chunk_size: default_read_chunk_size(),
            },
            tls: TlsConfig::default(),
            tcp: TcpConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Target of the secure connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectConfig {
    /// Hostname to dial. Also the name the leaf certificate must carry.
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Payload written once the socket is open, e.g. an HTTP request line.
    #[serde(default)]
    pub request: Option<String>,
    /// Raw transport idle timeout in seconds (0 = disabled).
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    /// Maximum bytes pulled from the socket per read.
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
}

/// Client-side TLS settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TlsConfig {
    /// PEM file with trusted root certificates. Defaults to the bundled
    /// Mozilla root set when unset.
    #[serde(default)]
    pub ca: Option<String>,
    /// ALPN protocols to offer, in preference order.
    #[serde(default)]
    pub alpn: Vec<String>,
}

/// TCP socket options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpConfig {
    /// Disable Nagle's algorithm (TCP_NODELAY) for lower latency.
    #[serde(default = "default_tcp_no_delay")]
    pub no_delay: bool,
    /// TCP Keep-Alive initial delay in seconds (0 = disabled).
    #[serde(default = "default_tcp_keepalive_secs")]
    pub keepalive_secs: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            no_delay: default_tcp_no_delay(),
            keepalive_secs: default_tcp_keepalive_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: Option<String>,
    /// Log format: json, pretty, or compact. Default: pretty.
    pub format: Option<String>,
    /// Output target: stdout or stderr. Default: stderr.
    pub output: Option<String>,
    /// Per-module log level filters (e.g., {"tlsock_tls": "debug", "rustls": "warn"}).
    #[serde(default)]
    pub filters: HashMap<String, String>,
}
