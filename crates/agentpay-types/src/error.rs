//! Error types for AgentPay
//!
//! Every failure the gateway can surface has a machine-readable code and a
//! fixed HTTP status. Business errors carry safe messages; infrastructure
//! errors are surfaced generically and logged with full context at the edge.

use thiserror::Error;

/// Result type for AgentPay operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// AgentPay error taxonomy
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    // ========================================================================
    // Request errors (400)
    // ========================================================================

    /// Request failed validation
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Request was structurally invalid
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Mutating request arrived without an Idempotency-Key header
    #[error("Idempotency-Key header is required for this endpoint")]
    MissingIdempotencyKey,

    /// Amount arithmetic overflowed
    #[error("Amount overflow during arithmetic operation")]
    AmountOverflow,

    // ========================================================================
    // Auth errors (401 / 403)
    // ========================================================================

    /// No usable credentials on the request
    #[error("Unauthorized")]
    Unauthorized,

    /// Bearer token failed verification
    #[error("Invalid bearer token")]
    InvalidToken,

    /// Bearer token has expired
    #[error("Bearer token has expired")]
    TokenExpired,

    /// Caller does not own the resource
    #[error("Forbidden")]
    Forbidden,

    // ========================================================================
    // Lookup errors (404)
    // ========================================================================

    /// Purchase intent not found
    #[error("Purchase intent {intent_id} not found")]
    IntentNotFound { intent_id: String },

    /// Mandate not found
    #[error("Mandate {mandate_id} not found")]
    MandateNotFound { mandate_id: String },

    /// Payment not found
    #[error("Payment {payment_id} not found")]
    PaymentNotFound { payment_id: String },

    /// Receipt not found
    #[error("Receipt {receipt_id} not found")]
    ReceiptNotFound { receipt_id: String },

    /// No unexpired policy exists for the agent
    #[error("No active policy found for agent {agent_id}")]
    PolicyNotFound { agent_id: String },

    // ========================================================================
    // Rail errors (402)
    // ========================================================================

    /// The rail requires payment context the request lacks
    #[error("Payment required: {message}")]
    PaymentRequired { message: String },

    /// The provider declined the payment
    #[error("Payment declined: {reason}")]
    PaymentDeclined { reason: String },

    // ========================================================================
    // Idempotency conflicts (409)
    // ========================================================================

    /// Same key replayed with a different request body
    #[error("Idempotency key was reused with a different request body")]
    IdempotencyConflict,

    /// Another request with the same key is still in flight
    #[error("A request with this idempotency key is still in flight")]
    InFlightConflict,

    // ========================================================================
    // Policy violations (422)
    // ========================================================================

    /// Vendor is not on the policy allowlist
    #[error("Vendor {vendor} is not allowed by the active policy")]
    VendorNotAllowed { vendor: String },

    /// Intent amount exceeds the per-transaction cap
    #[error("Amount {amount} exceeds the policy cap {cap}")]
    AmountExceedsCap { amount: i64, cap: i64 },

    /// Intent amount exceeds what remains of the daily cap
    #[error("Daily spending limit exceeded; {remaining} remaining today")]
    DailyLimitExceeded { remaining: i64 },

    /// Agent is not active
    #[error("Agent is not active (status: {status})")]
    AgentInactive { status: String },

    /// Mandate has expired
    #[error("Mandate {mandate_id} has expired")]
    MandateExpired { mandate_id: String },

    /// Mandate was revoked
    #[error("Mandate {mandate_id} has been revoked")]
    MandateRevoked { mandate_id: String },

    /// Mandate already settled a payment
    #[error("Mandate {mandate_id} has been exhausted")]
    MandateExhausted { mandate_id: String },

    /// Mandate signature failed verification
    #[error("Invalid mandate signature")]
    InvalidSignature,

    /// Agent risk tier forbids the operation
    #[error("Operation not permitted for high-risk agents")]
    HighRiskAgent,

    /// Policy evaluation could not complete; fail closed
    #[error("Policy check failed")]
    PolicyCheckFailed,

    // ========================================================================
    // Infrastructure errors (500 / 504)
    // ========================================================================

    /// Provider returned an unusable response
    #[error("Provider error: {message}")]
    Provider { message: String },

    /// Outbound call exceeded its deadline
    #[error("Timed out calling provider: {message}")]
    Timeout { message: String },

    /// Receipt chain verification found a break; never auto-repaired
    #[error("Receipt chain broken for agent {agent_id} at index {index}")]
    ReceiptChainBroken { agent_id: String, index: i64 },

    /// Store operation failed
    #[error("Database error: {message}")]
    Database { message: String },

    /// Process configuration is unusable
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Anything else
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    /// The machine-readable error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::InvalidRequest { .. } => "INVALID_REQUEST",
            Self::MissingIdempotencyKey => "MISSING_IDEMPOTENCY_KEY",
            Self::AmountOverflow => "VALIDATION_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::Forbidden => "FORBIDDEN",
            Self::IntentNotFound { .. } => "INTENT_NOT_FOUND",
            Self::MandateNotFound { .. } => "MANDATE_NOT_FOUND",
            Self::PaymentNotFound { .. } => "PAYMENT_NOT_FOUND",
            Self::ReceiptNotFound { .. } => "RECEIPT_NOT_FOUND",
            Self::PolicyNotFound { .. } => "POLICY_NOT_FOUND",
            Self::PaymentRequired { .. } => "PAYMENT_REQUIRED",
            Self::PaymentDeclined { .. } => "PAYMENT_DECLINED",
            Self::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
            Self::InFlightConflict => "IN_FLIGHT_CONFLICT",
            Self::VendorNotAllowed { .. } => "VENDOR_NOT_ALLOWED",
            Self::AmountExceedsCap { .. } => "AMOUNT_EXCEEDS_CAP",
            Self::DailyLimitExceeded { .. } => "DAILY_LIMIT_EXCEEDED",
            Self::AgentInactive { .. } => "AGENT_INACTIVE",
            Self::MandateExpired { .. } => "MANDATE_EXPIRED",
            Self::MandateRevoked { .. } => "MANDATE_REVOKED",
            Self::MandateExhausted { .. } => "MANDATE_EXHAUSTED",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::HighRiskAgent => "HIGH_RISK_AGENT",
            Self::PolicyCheckFailed => "POLICY_CHECK_FAILED",
            Self::Provider { .. } => "PROVIDER_ERROR",
            Self::Timeout { .. } => "TIMEOUT_ERROR",
            Self::ReceiptChainBroken { .. } => "RECEIPT_CHAIN_BROKEN",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// The fixed HTTP status this error maps to
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation { .. }
            | Self::InvalidRequest { .. }
            | Self::MissingIdempotencyKey
            | Self::AmountOverflow => 400,
            Self::Unauthorized | Self::InvalidToken | Self::TokenExpired => 401,
            Self::PaymentRequired { .. } | Self::PaymentDeclined { .. } => 402,
            Self::Forbidden => 403,
            Self::IntentNotFound { .. }
            | Self::MandateNotFound { .. }
            | Self::PaymentNotFound { .. }
            | Self::ReceiptNotFound { .. }
            | Self::PolicyNotFound { .. } => 404,
            Self::IdempotencyConflict | Self::InFlightConflict => 409,
            Self::VendorNotAllowed { .. }
            | Self::AmountExceedsCap { .. }
            | Self::DailyLimitExceeded { .. }
            | Self::AgentInactive { .. }
            | Self::MandateExpired { .. }
            | Self::MandateRevoked { .. }
            | Self::MandateExhausted { .. }
            | Self::InvalidSignature
            | Self::HighRiskAgent => 422,
            Self::Timeout { .. } => 504,
            Self::PolicyCheckFailed
            | Self::Provider { .. }
            | Self::ReceiptChainBroken { .. }
            | Self::Database { .. }
            | Self::Configuration { .. }
            | Self::Internal { .. } => 500,
        }
    }

    /// Structured details attached to the API error envelope, if any
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::DailyLimitExceeded { remaining } => {
                Some(serde_json::json!({ "remaining": remaining }))
            }
            Self::AmountExceedsCap { amount, cap } => {
                Some(serde_json::json!({ "amount": amount, "cap": cap }))
            }
            _ => None,
        }
    }

    /// Whether the caller may meaningfully retry the same request
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Provider { .. }
                | Self::Database { .. }
                | Self::PolicyCheckFailed
                | Self::Internal { .. }
        )
    }

    /// Whether this error should be surfaced with its real message, or
    /// replaced by a generic one at the API edge
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::Database { .. }
                | Self::Configuration { .. }
                | Self::Internal { .. }
                | Self::ReceiptChainBroken { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_match_taxonomy() {
        assert_eq!(
            GatewayError::DailyLimitExceeded { remaining: 200 }.error_code(),
            "DAILY_LIMIT_EXCEEDED"
        );
        assert_eq!(GatewayError::IdempotencyConflict.error_code(), "IDEMPOTENCY_CONFLICT");
        assert_eq!(GatewayError::PolicyCheckFailed.error_code(), "POLICY_CHECK_FAILED");
    }

    #[test]
    fn test_http_statuses() {
        assert_eq!(GatewayError::MissingIdempotencyKey.http_status(), 400);
        assert_eq!(GatewayError::Unauthorized.http_status(), 401);
        assert_eq!(GatewayError::Forbidden.http_status(), 403);
        assert_eq!(GatewayError::InFlightConflict.http_status(), 409);
        assert_eq!(
            GatewayError::VendorNotAllowed { vendor: "v2".into() }.http_status(),
            422
        );
        assert_eq!(GatewayError::Timeout { message: "card".into() }.http_status(), 504);
        assert_eq!(
            GatewayError::ReceiptChainBroken { agent_id: "a".into(), index: 2 }.http_status(),
            500
        );
    }

    #[test]
    fn test_daily_limit_details() {
        let err = GatewayError::DailyLimitExceeded { remaining: 200 };
        assert_eq!(err.details().unwrap()["remaining"], 200);
    }

    #[test]
    fn test_policy_failures_are_not_silent_allows() {
        // Fail-closed: a failed check is an error, and it is retriable.
        assert!(GatewayError::PolicyCheckFailed.is_retriable());
    }
}
