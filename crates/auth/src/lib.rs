//! `campuskit-auth` — multi-tenant authentication/authorization core.
//!
//! This crate is intentionally decoupled from HTTP and storage: transports
//! map [`campuskit_core::AuthError`] to status codes at their boundary, and
//! persistence/directory backends plug in behind the `CredentialStore` and
//! `AccountDirectory` traits.

pub mod credential;
pub mod directory;
pub mod hasher;
pub mod keyring;
pub mod policy;
pub mod provider;
pub mod service;
pub mod token;

pub use credential::{CREDENTIAL_KIND_LOCAL, Credential, CredentialStore, InMemoryCredentialStore};
pub use directory::{
    Account, AccountDirectory, AccountStatus, InMemoryDirectory, TenantMembership,
};
pub use hasher::PasswordHasher;
pub use keyring::{KeyPurpose, KeyRing, KeyRotator, Secret};
pub use policy::{GLOBAL_ROLE, Method, PolicyDocument, PolicyTable, RouteRequest, authorize};
pub use provider::{CredentialProvider, LocalProvider, ProviderKind, build_provider};
pub use service::{AuthService, AuthzContext, LoginRequest, LoginResponse, TenantSummary};
pub use token::{CapabilityKind, TokenClaims, TokenService};
