//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Check addresses parse before anything binds to them
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: GatewayConfig -> Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a loaded configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "listener.bind_address".to_string(),
            message: format!("not a valid socket address: {}", config.listener.bind_address),
        });
    }

    if config.core.host.is_empty() {
        errors.push(ValidationError {
            field: "core.host".to_string(),
            message: "must not be empty".to_string(),
        });
    }

    if config.core.port == 0 {
        errors.push(ValidationError {
            field: "core.port".to_string(),
            message: "must be non-zero".to_string(),
        });
    }

    if config.timeouts.query_secs == 0 {
        errors.push(ValidationError {
            field: "timeouts.query_secs".to_string(),
            message: "must be non-zero".to_string(),
        });
    }

    if config.timeouts.request_secs < config.timeouts.query_secs {
        errors.push(ValidationError {
            field: "timeouts.request_secs".to_string(),
            message: "must be at least timeouts.query_secs".to_string(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError {
            field: "observability.metrics_address".to_string(),
            message: format!(
                "not a valid socket address: {}",
                config.observability.metrics_address
            ),
        });
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
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "nonsense".to_string();
        config.core.port = 0;
        config.timeouts.query_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.field == "core.port"));
    }

    #[test]
    fn test_request_timeout_must_cover_query_timeout() {
        let mut config = GatewayConfig::default();
        config.timeouts.query_secs = 10;
        config.timeouts.request_secs = 5;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "timeouts.request_secs");
    }
}
