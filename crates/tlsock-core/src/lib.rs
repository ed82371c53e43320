//! Core constants shared across tlsock crates.
//!
//! This crate provides:
//! - Default configuration values
//! - Error kind labels for logging
//! - Common project metadata

pub mod defaults;
pub mod errors;

pub use defaults::*;
pub use errors::*;

/// Project name.
pub const PROJECT_NAME: &str = "tlsock";
/// Project version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
