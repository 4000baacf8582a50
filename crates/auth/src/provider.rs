//! Pluggable credential providers.
//!
//! One provider is selected at startup and held behind a single trait object;
//! the rest of the service never branches on the provider kind. The local
//! provider is fully implemented here. External identity providers plug in
//! behind the same contract.

use std::sync::Arc;

use campuskit_core::{AccountId, AuthError, AuthResult};

use crate::credential::{CREDENTIAL_KIND_LOCAL, Credential, CredentialStore};
use crate::hasher::PasswordHasher;

/// Credential provider contract.
///
/// `login` folds *all* failure causes (unknown identity, wrong password) into
/// `InvalidCredentials` so callers cannot enumerate accounts.
pub trait CredentialProvider: Send + Sync {
    fn login(&self, id: &str, password: &str) -> AuthResult<Credential>;

    fn create(&self, id: &str, password: &str, account_id: AccountId) -> AuthResult<Credential>;

    /// Regenerate the salt and replace the digest.
    fn change_password(&self, id: &str, new_password: &str) -> AuthResult<Credential>;

    /// Self-service rename: `caller_id` must own `old_id`, and `new_id` must
    /// actually differ.
    fn change_identifier(&self, caller_id: &str, old_id: &str, new_id: &str)
    -> AuthResult<Credential>;

    fn delete(&self, id: &str) -> AuthResult<Credential>;

    /// Raw lookup, for service-level business rules. Internal use; not part of
    /// any external surface.
    fn get(&self, id: &str) -> AuthResult<Option<Credential>>;

    /// Whether `password` matches the stored digest for `id`.
    fn password_matches(&self, id: &str, password: &str) -> AuthResult<bool>;
}

/// Which provider to construct at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Self-hosted credentials (the only kind this crate implements).
    Local,
    /// External identity provider; contract-only, not available here.
    External,
}

/// Build the configured provider.
pub fn build_provider(
    kind: ProviderKind,
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
) -> AuthResult<Box<dyn CredentialProvider>> {
    match kind {
        ProviderKind::Local => Ok(Box::new(LocalProvider::new(store, hasher))),
        ProviderKind::External => Err(AuthError::validation(
            "external identity provider is not available in this deployment",
        )),
    }
}

/// Self-hosted credential provider: store + two-stage hasher.
pub struct LocalProvider {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
}

impl LocalProvider {
    pub fn new(store: Arc<dyn CredentialStore>, hasher: PasswordHasher) -> Self {
        Self { store, hasher }
    }
}

impl CredentialProvider for LocalProvider {
    fn login(&self, id: &str, password: &str) -> AuthResult<Credential> {
        // Absent record and wrong password take the same exit.
        let Some(credential) = self.store.get(id)? else {
            return Err(AuthError::InvalidCredentials);
        };
        if !self
            .hasher
            .verify(password, &credential.salt, &credential.password_hash)
        {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(credential)
    }

    fn create(&self, id: &str, password: &str, account_id: AccountId) -> AuthResult<Credential> {
        let salt = PasswordHasher::generate_salt();
        let credential = Credential {
            id: id.to_string(),
            password_hash: self.hasher.hash(password, &salt)?,
            salt,
            account_id,
            kind: CREDENTIAL_KIND_LOCAL.to_string(),
        };
        self.store.insert(credential.clone())?;
        Ok(credential)
    }

    fn change_password(&self, id: &str, new_password: &str) -> AuthResult<Credential> {
        let mut credential = self.store.get(id)?.ok_or(AuthError::NotFound)?;
        credential.salt = PasswordHasher::generate_salt();
        credential.password_hash = self.hasher.hash(new_password, &credential.salt)?;
        self.store.update(credential.clone())?;
        Ok(credential)
    }

    fn change_identifier(
        &self,
        caller_id: &str,
        old_id: &str,
        new_id: &str,
    ) -> AuthResult<Credential> {
        if new_id == old_id {
            return Err(AuthError::validation("same identifier"));
        }
        if caller_id != old_id {
            return Err(AuthError::validation("same identifier"));
        }
        self.store.rename(old_id, new_id)
    }

    fn delete(&self, id: &str) -> AuthResult<Credential> {
        self.store.remove(id)
    }

    fn get(&self, id: &str) -> AuthResult<Option<Credential>> {
        self.store.get(id)
    }

    fn password_matches(&self, id: &str, password: &str) -> AuthResult<bool> {
        let Some(credential) = self.store.get(id)? else {
            return Ok(false);
        };
        Ok(self
            .hasher
            .verify(password, &credential.salt, &credential.password_hash))
    }
}
