//! Closed error taxonomy for the auth core.
//!
//! Keep this focused on deterministic auth/authz failures. Transport status
//! codes are derived here but applied at the boundary only; library code never
//! formats HTTP responses.

use thiserror::Error;

/// Result type used across the auth core.
pub type AuthResult<T> = Result<T, AuthError>;

/// Why an otherwise-authenticated request was denied.
///
/// These are internal distinctions. The externally visible message for every
/// variant is the same coarse category (see [`AuthError::public_message`]);
/// revealing which check failed would aid enumeration.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The opaque bearer value could not be unwrapped with any live key.
    #[error("cannot decrypt data")]
    CannotDecrypt,

    /// The unwrapped token failed signature, expiry, or issuer checks.
    #[error("invalid jwt")]
    InvalidToken,

    /// The resolved account is disabled.
    #[error("account disabled")]
    AccountDisabled,

    /// The caller has no membership in the request's tenant.
    #[error("no such tenant membership")]
    NoSuchTenantMembership,

    /// The caller's membership in the request's tenant is disabled.
    #[error("tenant membership disabled")]
    TenantDisabled,

    /// No granted role covers the requested method/route.
    #[error("route not accessible")]
    RouteNotAccessible,

    /// A same-identity-only route was requested for a different identity.
    #[error("identity restriction")]
    IdentityRestriction,
}

/// Auth-core error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Request shape or business-rule validation failed (caller-recoverable).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Login failed. Deliberately carries no detail: wrong password, unknown
    /// identity, and disabled account are indistinguishable to the caller.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// An authenticated request was denied.
    #[error("unauthorized: {0}")]
    Unauthorized(DenyReason),

    /// A referenced resource does not exist.
    #[error("not found")]
    NotFound,

    /// A uniqueness constraint was violated (e.g. duplicate credential id).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Infrastructure or crypto failure after the caller's input was accepted.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Transport status this error maps to at the boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::Validation(_) => 400,
            AuthError::InvalidCredentials | AuthError::Unauthorized(_) => 401,
            AuthError::NotFound => 404,
            AuthError::Conflict(_) => 409,
            AuthError::Internal(_) => 500,
        }
    }

    /// Fixed external message. Credential and token failures never leak the
    /// underlying cause; full detail goes to the audit log instead.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "Invalid request",
            AuthError::InvalidCredentials => "Invalid username/password",
            AuthError::Unauthorized(DenyReason::CannotDecrypt) => "Cannot decrypt data",
            AuthError::Unauthorized(DenyReason::InvalidToken) => "Invalid jwt",
            AuthError::Unauthorized(_) => "Not authorized",
            AuthError::NotFound => "Not found",
            AuthError::Conflict(_) => "Conflict",
            AuthError::Internal(_) => "Internal error",
        }
    }
}
