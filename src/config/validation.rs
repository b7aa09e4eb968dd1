//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (buffer sizes, ports)
//! - Check the key set is usable as URL path segments
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address {0:?}: expected host:port with port in 1..65535")]
    BindAddress(String),

    #[error("initial buffer size must be non-zero")]
    ZeroInitialBuffer,

    #[error("initial buffer size {initial} exceeds max request size {max}")]
    BufferSizes { initial: usize, max: usize },

    #[error("max_events must be non-zero")]
    ZeroMaxEvents,

    #[error("storage path must not be empty")]
    EmptyStoragePath,

    #[error("at least one key must be configured")]
    NoKeys,

    #[error("invalid key name {0:?}: use ASCII letters, digits, '_' or '-'")]
    KeyName(String),

    #[error("duplicate key {0:?}")]
    DuplicateKey(String),

    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),
}

/// Host/port pair parsed from a `host:port` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindAddress {
    pub host: String,
    pub port: u16,
}

/// Split and check a `host:port` bind string.
///
/// IPv6 hosts may be bracketed (`[::1]:8080`); the brackets are stripped.
pub fn parse_bind_address(raw: &str) -> Result<BindAddress, ValidationError> {
    let invalid = || ValidationError::BindAddress(raw.to_string());

    let (host, port) = raw.rsplit_once(':').ok_or_else(invalid)?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return Err(invalid());
    }

    let port: u32 = port.parse().map_err(|_| invalid())?;
    if port == 0 || port > u32::from(u16::MAX) {
        return Err(invalid());
    }

    Ok(BindAddress {
        host: host.to_string(),
        port: port as u16,
    })
}

fn is_valid_key_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = parse_bind_address(&config.listener.bind_address) {
        errors.push(e);
    }

    let limits = &config.limits;
    if limits.initial_buffer_bytes == 0 {
        errors.push(ValidationError::ZeroInitialBuffer);
    } else if limits.initial_buffer_bytes > limits.max_request_bytes {
        errors.push(ValidationError::BufferSizes {
            initial: limits.initial_buffer_bytes,
            max: limits.max_request_bytes,
        });
    }

    if config.workers.max_events == 0 {
        errors.push(ValidationError::ZeroMaxEvents);
    }

    if config.storage.path.trim().is_empty() {
        errors.push(ValidationError::EmptyStoragePath);
    }

    if config.keys.is_empty() {
        errors.push(ValidationError::NoKeys);
    }
    let mut seen = HashSet::new();
    for key in &config.keys {
        if !is_valid_key_name(&key.name) {
            errors.push(ValidationError::KeyName(key.name.clone()));
        } else if !seen.insert(key.name.as_str()) {
            errors.push(ValidationError::DuplicateKey(key.name.clone()));
        }
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(obs.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
