//! `campuskit-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the closed error taxonomy, and process-level
//! configuration for the auth core.

pub mod config;
pub mod error;
pub mod id;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult, DenyReason};
pub use id::{AccountId, TenantId};
