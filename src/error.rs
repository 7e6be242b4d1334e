//! Unified error handling for the gateway pipeline.
//!
//! Each pipeline component returns a typed failure; the dispatch handler
//! consumes them and maps each to an HTTP status plus a stable error code.
//! Failures never cross component boundaries un-typed, and client-visible
//! messages never carry request content.

use thiserror::Error;

use crate::abstraction::AbstractionError;
use crate::audit::AuditError;
use crate::sanitize::SanitizeError;
use crate::upstream::UpstreamError;

/// Terminal failure of one request, as seen by the dispatch handler.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Client sent malformed JSON or missing required fields.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Intentional refusal: critical-blocked route or scorer failure.
    #[error("request blocked by policy")]
    PolicyBlock,

    /// Sanitizer internal failure.
    #[error("sanitization failed")]
    Sanitization(#[from] SanitizeError),

    /// Abstractor missing or erroring on a route that requires it.
    #[error("abstraction unavailable")]
    AbstractionUnavailable(#[source] Option<AbstractionError>),

    /// Upstream exceeded the per-request deadline.
    #[error("provider timeout")]
    ProviderTimeout,

    /// Upstream non-2xx, transport failure, or missing adapter.
    #[error("provider request failed")]
    ProviderFailure(#[source] Option<UpstreamError>),

    /// Strict-audit mode and the append failed.
    #[error("audit append failed")]
    AuditFailure(#[from] AuditError),
}

impl GatewayError {
    /// HTTP status for the error envelope.
    pub fn http_status(&self) -> u16 {
        match self {
            GatewayError::Validation(_) => 400,
            GatewayError::PolicyBlock => 403,
            GatewayError::Sanitization(_) => 500,
            GatewayError::AbstractionUnavailable(_) => 503,
            GatewayError::ProviderTimeout => 503,
            GatewayError::ProviderFailure(_) => 502,
            GatewayError::AuditFailure(_) => 500,
        }
    }

    /// Stable machine-readable code for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "ERR_VALIDATION",
            GatewayError::PolicyBlock => "ERR_POLICY_BLOCK",
            GatewayError::Sanitization(_) => "ERR_SANITIZATION_FAILURE",
            GatewayError::AbstractionUnavailable(_) => "ERR_ABSTRACTION_UNAVAILABLE",
            GatewayError::ProviderTimeout => "ERR_PROVIDER_TIMEOUT",
            GatewayError::ProviderFailure(_) => "ERR_PROVIDER_FAILURE",
            GatewayError::AuditFailure(_) => "ERR_AUDIT_FAILURE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_code_pairing() {
        let cases: Vec<(GatewayError, u16, &str)> = vec![
            (
                GatewayError::Validation("model is required".into()),
                400,
                "ERR_VALIDATION",
            ),
            (GatewayError::PolicyBlock, 403, "ERR_POLICY_BLOCK"),
            (
                GatewayError::AbstractionUnavailable(None),
                503,
                "ERR_ABSTRACTION_UNAVAILABLE",
            ),
            (GatewayError::ProviderTimeout, 503, "ERR_PROVIDER_TIMEOUT"),
            (
                GatewayError::ProviderFailure(None),
                502,
                "ERR_PROVIDER_FAILURE",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.http_status(), status);
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn display_messages_carry_no_detail_for_provider_errors() {
        let err = GatewayError::ProviderFailure(Some(UpstreamError::Transport(
            "connect refused to 10.0.0.1".into(),
        )));
        assert_eq!(err.to_string(), "provider request failed");
    }
}
