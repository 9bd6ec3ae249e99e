//! Gateway-wide error taxonomy.
//!
//! Validation errors are resolved locally and never reach the core node.
//! Core-reported failures pass through verbatim. Infrastructure errors are
//! fatal to in-flight waits but never to the gateway process.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while serving a gateway operation.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Required request fields are missing or malformed. Fails before any
    /// core call is made.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A transaction payload could not be decoded from its wire encoding.
    #[error("malformed transaction encoding: {0}")]
    MalformedEncoding(String),

    /// A domain or user identifier is not a well-formed binary identifier
    /// of the expected length.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    /// No response arrived for the query within the deadline. The pending
    /// wait has been discarded; a late response will be dropped.
    #[error("no response from core within {0:?}")]
    Timeout(Duration),

    /// The core answered with a failure reason. Surfaced verbatim.
    #[error("core reported failure: {0}")]
    Backend(String),

    /// The session or correlation state machine was driven out of order
    /// (unbind without bind, stale binding left on the connection).
    #[error("protocol state violation: {0}")]
    ProtocolViolation(String),

    /// The shared core connection went away. In-flight waits all resolve
    /// to this; callers are expected to retry once the link is back.
    #[error("core connection lost")]
    ConnectionLost,

    /// I/O failure talking to the core node.
    #[error("core i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GatewayError::Timeout(Duration::from_secs(5));
        assert!(err.to_string().contains("5s"));

        let err = GatewayError::Backend("domain not found".to_string());
        assert_eq!(err.to_string(), "core reported failure: domain not found");
    }
}
