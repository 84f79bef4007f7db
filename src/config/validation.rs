//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (grace period within bounds, distinct ports)
//! - Check addresses and log levels parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{IpAddr, SocketAddr};

use crate::config::schema::ServiceConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.host {0:?} is not an IP address")]
    InvalidHost(String),
    #[error("listener.http_port and listener.https_port are both {0}")]
    PortConflict(u16),
    #[error("shutdown.grace_period_secs must be greater than 0")]
    ZeroGracePeriod,
    #[error("shutdown.grace_period_secs {0} exceeds the maximum of 3600")]
    GracePeriodTooLong(u64),
    #[error("http.request_timeout_secs must be greater than 0")]
    ZeroRequestTimeout,
    #[error("http.max_body_bytes must be greater than 0")]
    ZeroBodyLimit,
    #[error("observability.log_level {0:?} is not one of trace, debug, info, warn, error")]
    UnknownLogLevel(String),
    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Upper bound on the shutdown grace period.
pub const MAX_GRACE_PERIOD_SECS: u64 = 3600;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listener = &config.listener;
    if listener.host.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidHost(listener.host.clone()));
    }
    // Port 0 asks the OS for an ephemeral port, so two zeros never collide.
    if listener.http_port != 0 && listener.http_port == listener.https_port {
        errors.push(ValidationError::PortConflict(listener.http_port));
    }

    let grace = config.shutdown.grace_period_secs;
    if grace == 0 {
        errors.push(ValidationError::ZeroGracePeriod);
    } else if grace > MAX_GRACE_PERIOD_SECS {
        errors.push(ValidationError::GracePeriodTooLong(grace));
    }
    if config.http.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }
    if config.http.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    let observability = &config.observability;
    if !LOG_LEVELS.contains(&observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::UnknownLogLevel(observability.log_level.clone()));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
