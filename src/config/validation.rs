//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rates > 0, TTLs > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RegistryConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::RegistryConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check every semantic constraint and collect the failures.
pub fn validate_config(config: &RegistryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("{:?} is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_in_flight == 0 {
        errors.push(ValidationError::new("listener.max_in_flight", "must be at least 1"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be at least 1"));
    }

    let rate = &config.rate_limit;
    if !(rate.requests_per_second.is_finite() && rate.requests_per_second > 0.0) {
        errors.push(ValidationError::new(
            "rate_limit.requests_per_second",
            "must be a positive number",
        ));
    }
    if rate.burst_size == 0 {
        errors.push(ValidationError::new("rate_limit.burst_size", "must be at least 1"));
    }

    let idem = &config.idempotency;
    if idem.ttl_secs == 0 {
        errors.push(ValidationError::new("idempotency.ttl_secs", "must be at least 1"));
    } else if idem.enabled && idem.ttl_secs < config.timeouts.request_secs {
        // An in-flight reservation must outlive the slowest request.
        errors.push(ValidationError::new(
            "idempotency.ttl_secs",
            format!(
                "must be at least timeouts.request_secs ({})",
                config.timeouts.request_secs
            ),
        ));
    }
    if idem.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "idempotency.sweep_interval_secs",
            "must be at least 1",
        ));
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", obs.metrics_address),
        ));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be at least 1"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&RegistryConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = RegistryConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.rate_limit.requests_per_second = f64::NAN;
        config.idempotency.ttl_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "rate_limit.requests_per_second",
                "idempotency.ttl_secs"
            ]
        );
    }

    #[test]
    fn test_idempotency_ttl_covers_request_timeout() {
        let mut config = RegistryConfig::default();
        config.timeouts.request_secs = 60;
        config.idempotency.ttl_secs = 30;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "idempotency.ttl_secs");
        assert!(errors[0].message.contains("timeouts.request_secs (60)"));

        config.idempotency.ttl_secs = 60;
        assert!(validate_config(&config).is_ok());

        // Irrelevant when the cache is off.
        config.idempotency.ttl_secs = 30;
        config.idempotency.enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = RegistryConfig::default();
        config.observability.metrics_address = "bad".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(validate_config(&config).unwrap_err().len(), 1);
    }
}
