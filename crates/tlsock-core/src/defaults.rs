//! Default configuration values.
//!
//! Centralized default constants for use across all crates.

// ============================================================================
// Connect Defaults
// ============================================================================

/// Default TLS port.
pub const DEFAULT_PORT: u16 = 443;
/// Default idle timeout applied to the raw transport, in seconds (0 = disabled).
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30;
/// Default TLS handshake timeout in seconds.
pub const DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Buffer/Size Defaults
// ============================================================================

/// Default size of a single plaintext read pulled from the socket (16 KiB,
/// one maximal TLS record).
pub const DEFAULT_READ_CHUNK_SIZE: usize = 16 * 1024;
/// Smallest accepted read chunk size.
pub const MIN_READ_CHUNK_SIZE: usize = 512;
/// Largest accepted read chunk size.
pub const MAX_READ_CHUNK_SIZE: usize = 1024 * 1024;
/// Default size of the buffer used for raw transport reads.
pub const DEFAULT_TRANSPORT_READ_BUFFER: usize = 16 * 1024;

// ============================================================================
// TCP Socket Defaults
// ============================================================================

/// Default TCP_NODELAY (disable Nagle's algorithm for lower latency).
pub const DEFAULT_TCP_NO_DELAY: bool = true;
/// Default TCP Keep-Alive initial delay in seconds (0 = disabled).
pub const DEFAULT_TCP_KEEPALIVE_SECS: u64 = 300;

// ============================================================================
// Logging Defaults
// ============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Default log format.
pub const DEFAULT_LOG_FORMAT: &str = "pretty";
/// Default log output.
pub const DEFAULT_LOG_OUTPUT: &str = "stderr";
