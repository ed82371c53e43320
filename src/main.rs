//! Unified tlsock CLI.
//!
//! - `tlsock connect` - open a TLS connection and stream the response
//! - `tlsock check-cert` - check a certificate against a hostname offline

use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// tlsock unified CLI.
#[derive(Parser)]
#[command(
    name = "tlsock",
    version,
    about = "Client-side TLS with strict hostname checking",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect, send the request and print the response.
    #[command(name = "connect")]
    Connect(Box<tlsock_client::ConnectArgs>),

    /// Check a PEM certificate chain against a hostname.
    #[command(name = "check-cert")]
    CheckCert(tlsock_client::CheckCertArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Connect(args) => tlsock_client::cli::run(*args).await,
        Commands::CheckCert(args) => tlsock_client::cli::run_check(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
