//! CLI module for tlsock-client.

use std::io;
use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use tlsock_config::{CliOverrides, Config, LoggingConfig, apply_overrides, load_config, validate_config};
use tlsock_core::defaults::{DEFAULT_LOG_FORMAT, DEFAULT_LOG_LEVEL, DEFAULT_LOG_OUTPUT, DEFAULT_PORT};
use tlsock_core::{PROJECT_NAME, VERSION};
use tlsock_tls::{TrustAnchors, Verdict};

use crate::check::{check_chain, read_chain};
use crate::error::ClientError;
use crate::session::{load_anchors, run_session};

/// Open a TLS connection and stream the response to stdout.
#[derive(Parser, Debug, Clone)]
#[command(name = "tlsock-connect", version, about = "TLS client with strict hostname checking")]
pub struct ConnectArgs {
    /// Config file path (toml/json/jsonc/yaml).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: CliOverrides,
}

/// Check a PEM certificate chain against a hostname without connecting.
#[derive(Parser, Debug, Clone)]
#[command(name = "tlsock-check-cert", version)]
pub struct CheckCertArgs {
    /// PEM file holding the leaf certificate first, then any intermediates.
    #[arg(long)]
    pub cert: PathBuf,

    /// Hostname the leaf's common name must equal.
    #[arg(long)]
    pub host: String,

    /// Also validate the chain against these roots (PEM).
    #[arg(long)]
    pub ca: Option<PathBuf>,
}

/// Build the effective configuration from a file and CLI overrides.
pub fn resolve_config(args: &ConnectArgs) -> Result<Config, ClientError> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            let host = args.overrides.host.clone().ok_or_else(|| {
                ClientError::Usage("--host is required when no --config is given".into())
            })?;
            Config::for_target(host, DEFAULT_PORT)
        }
    };
    apply_overrides(&mut config, &args.overrides);
    validate_config(&config)?;
    Ok(config)
}

/// Run the connect command.
pub async fn run(args: ConnectArgs) -> Result<(), ClientError> {
    let config = resolve_config(&args)?;
    init_tracing(&config.logging);
    info!(
        version = VERSION,
        host = %config.connect.host,
        port = config.connect.port,
        "{PROJECT_NAME} connecting"
    );

    let anchors = load_anchors(&config.tls)?;

    // Graceful shutdown
    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();

    tokio::spawn(async move {
        shutdown_signal_handler().await;
        info!("shutdown signal received");
        shutdown_signal.cancel();
    });

    let mut stdout = tokio::io::stdout();
    let summary = run_session(&config, anchors, &mut stdout, shutdown).await?;
    info!(
        sent = summary.bytes_sent,
        received = summary.bytes_received,
        cancelled = summary.cancelled,
        "done"
    );
    Ok(())
}

/// Run the check-cert command. Prints the verdict; fails if the chain is not accepted.
pub fn run_check(args: CheckCertArgs) -> Result<(), ClientError> {
    let chain = read_chain(&args.cert)?;
    let anchors = args
        .ca
        .as_ref()
        .map(TrustAnchors::from_pem_file)
        .transpose()?;
    let report = check_chain(&chain, &args.host, anchors.as_ref())?;

    let cn = report.common_name.as_deref().unwrap_or("<none>");
    match &report.verdict {
        Verdict::Verified => {
            println!("ok: {} (common name {cn})", report.hostname);
            Ok(())
        }
        Verdict::Invalid(e) => {
            println!("invalid: {e}");
            Err(ClientError::Usage(format!("certificate chain rejected: {e}")))
        }
        Verdict::Rejected { alert, message } => {
            println!("rejected ({alert:?}): {message}");
            Err(ClientError::Usage(message.clone()))
        }
    }
}

async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Install the global subscriber. Logs never go to stdout unless asked,
/// since stdout carries the response body.
pub fn init_tracing(config: &LoggingConfig) {
    let base_level = config.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL);
    let mut filter_str = base_level.to_string();

    for (module, level) in &config.filters {
        filter_str.push(',');
        filter_str.push_str(module);
        filter_str.push('=');
        filter_str.push_str(level);
    }

    let filter = EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new("info"));

    let format = config.format.as_deref().unwrap_or(DEFAULT_LOG_FORMAT);
    let output = config.output.as_deref().unwrap_or(DEFAULT_LOG_OUTPUT);

    match (format, output) {
        ("json", "stdout") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stdout))
                .init();
        }
        ("json", _) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stderr))
                .init();
        }
        ("compact", "stdout") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_writer(io::stdout))
                .init();
        }
        ("compact", _) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
        (_, "stdout") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stdout))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stderr))
                .init();
        }
    }
}
