//! Process-level configuration for the auth core.
//!
//! All values are provided once at startup (environment or deployment
//! tooling); nothing here is hot-reloaded.

use std::time::Duration;

use crate::error::{AuthError, AuthResult};

/// Startup configuration for the auth core.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Issuer string embedded in signed tokens and envelopes.
    pub issuer: String,

    /// Deployment-wide pepper mixed into the second hashing stage.
    /// Distinct from per-credential salts; never persisted next to them.
    pub pepper: String,

    /// Lifetime of issued bearer tokens.
    pub token_ttl: Duration,

    /// Interval between key rotations, shared by both key rings.
    pub rotation_interval: Duration,
}

impl AuthConfig {
    pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

    /// Check startup invariants.
    ///
    /// The rotation interval must be at least the token TTL: with a ring of
    /// two keys, any still-valid token crosses at most one rotation boundary
    /// and stays verifiable under the retained previous key.
    pub fn validate(&self) -> AuthResult<()> {
        if self.issuer.trim().is_empty() {
            return Err(AuthError::validation("issuer must not be empty"));
        }
        if self.pepper.trim().is_empty() {
            return Err(AuthError::validation("pepper must not be empty"));
        }
        if self.rotation_interval < self.token_ttl {
            return Err(AuthError::validation(
                "rotation interval must be >= token ttl",
            ));
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "campuskit".to_string(),
            pepper: String::new(),
            token_ttl: Self::DEFAULT_TOKEN_TTL,
            rotation_interval: Self::DEFAULT_TOKEN_TTL,
        }
    }
}
