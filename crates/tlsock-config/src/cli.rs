//! CLI override definitions and application logic.

use clap::Parser;

use crate::Config;

#[derive(Debug, Clone, Parser, Default)]
pub struct CliOverrides {
    /// Override target hostname (also the expected certificate common name)
    #[arg(long)]
    pub host: Option<String>,
    /// Override target port
    #[arg(long)]
    pub port: Option<u16>,
    /// Override the payload written after the handshake
    #[arg(long)]
    pub request: Option<String>,
    /// Override trusted root CA file (PEM)
    #[arg(long)]
    pub ca: Option<String>,
    /// Override ALPN list (repeatable or comma-separated)
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub alpn: Option<Vec<String>>,
    /// Override idle timeout (seconds, 0 = disabled)
    #[arg(long)]
    pub idle_timeout_secs: Option<u64>,
    /// Override TLS handshake timeout (seconds)
    #[arg(long)]
    pub handshake_timeout_secs: Option<u64>,
    /// Override log level (trace/debug/info/warn/error)
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(v) = &overrides.host {
        config.connect.host = v.clone();
    }
    if let Some(v) = overrides.port {
        config.connect.port = v;
    }
    if let Some(v) = &overrides.request {
        config.connect.request = Some(v.clone());
    }
    if let Some(v) = &overrides.ca {
        config.tls.ca = Some(v.clone());
    }
    if let Some(v) = &overrides.alpn {
        config.tls.alpn = v.clone();
    }
    if let Some(v) = overrides.idle_timeout_secs {
        config.connect.idle_timeout_secs = v;
    }
    if let Some(v) = overrides.handshake_timeout_secs {
        config.connect.handshake_timeout_secs = v;
    }
    if let Some(v) = &overrides.log_level {
        config.logging.level = Some(v.clone());
    }
}
