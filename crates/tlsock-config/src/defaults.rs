//! Default value functions for serde deserialization.
//!
//! These functions forward to constants defined in `tlsock_core::defaults`.

use tlsock_core::defaults;

/// Generate default value functions that forward to tlsock_core::defaults constants.
macro_rules! default_fns {
    // For Copy types (integers, bool, etc.)
    ($($fn_name:ident => $const_name:ident : $ty:ty),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> $ty {
                defaults::$const_name
            }
        )*
    };
}

default_fns! {
    default_port                      => DEFAULT_PORT: u16,
    default_idle_timeout_secs         => DEFAULT_IDLE_TIMEOUT_SECS: u64,
    default_handshake_timeout_secs    => DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECS: u64,
    default_read_chunk_size           => DEFAULT_READ_CHUNK_SIZE: usize,
    min_read_chunk_size               => MIN_READ_CHUNK_SIZE: usize,
    max_read_chunk_size               => MAX_READ_CHUNK_SIZE: usize,
    default_tcp_no_delay              => DEFAULT_TCP_NO_DELAY: bool,
    default_tcp_keepalive_secs        => DEFAULT_TCP_KEEPALIVE_SECS: u64,
}
