//! Configuration validation logic.

use crate::Config;
use crate::defaults::{max_read_chunk_size, min_read_chunk_size};
use crate::loader::ConfigError;

const LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];
const LOG_OUTPUTS: [&str; 2] = ["stdout", "stderr"];

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.connect.host.trim().is_empty() {
        return Err(ConfigError::Validation("connect.host is empty".into()));
    }
    if config.connect.port == 0 {
        return Err(ConfigError::Validation(
            "connect.port must be 1..=65535".into(),
        ));
    }
    if config.connect.handshake_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "connect.handshake_timeout_secs must be > 0".into(),
        ));
    }
    let chunk = config.connect.read_chunk_size;
    if chunk < min_read_chunk_size() || chunk > max_read_chunk_size() {
        return Err(ConfigError::Validation(format!(
            "connect.read_chunk_size must be {}..={}",
            min_read_chunk_size(),
            max_read_chunk_size()
        )));
    }
    if let Some(ca) = &config.tls.ca
        && ca.trim().is_empty()
    {
        return Err(ConfigError::Validation("tls.ca is empty".into()));
    }
    if config.tls.alpn.iter().any(|p| p.is_empty() || p.len() > 255) {
        return Err(ConfigError::Validation(
            "tls.alpn entries must be 1..=255 bytes".into(),
        ));
    }
    if let Some(format) = &config.logging.format
        && !LOG_FORMATS.contains(&format.as_str())
    {
        return Err(ConfigError::Validation(format!(
            "logging.format must be one of: {:?}",
            LOG_FORMATS
        )));
    }
    if let Some(output) = &config.logging.output
        && !LOG_OUTPUTS.contains(&output.as_str())
    {
        return Err(ConfigError::Validation(format!(
            "logging.output must be one of: {:?}",
            LOG_OUTPUTS
        )));
    }
    Ok(())
}
