//! Credential records and their store.
//!
//! One record per login identity (email). The store owns persistence only;
//! hashing and business rules (password-unchanged, rename ownership) live in
//! the provider and service layers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use campuskit_core::{AccountId, AuthError, AuthResult};

/// Record type marker for locally-held credentials.
pub const CREDENTIAL_KIND_LOCAL: &str = "local";

/// A stored credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Login identity (email); primary key.
    pub id: String,

    /// Two-stage salted digest, hex-encoded.
    pub password_hash: String,

    /// Per-record salt, hex-encoded. Regenerated on every password change.
    pub salt: String,

    /// Owning account. Deleting the account cascades to this record.
    pub account_id: AccountId,

    /// Provider marker (e.g. "local").
    pub kind: String,
}

/// Persistence contract for credentials.
///
/// Unique-index semantics on `id`; no hashing, no policy.
pub trait CredentialStore: Send + Sync {
    fn get(&self, id: &str) -> AuthResult<Option<Credential>>;

    /// Insert a new record; `Conflict` if `id` already exists.
    fn insert(&self, credential: Credential) -> AuthResult<()>;

    /// Replace an existing record; `NotFound` if absent.
    fn update(&self, credential: Credential) -> AuthResult<()>;

    /// Re-key a record from `old_id` to `new_id`.
    ///
    /// `NotFound` if `old_id` is absent, `Conflict` if `new_id` is taken.
    fn rename(&self, old_id: &str, new_id: &str) -> AuthResult<Credential>;

    /// Remove and return a record; `NotFound` if absent.
    fn remove(&self, id: &str) -> AuthResult<Credential>;
}

/// In-memory credential store for tests/dev.
///
/// Tracks a mutation counter so tests can assert that rejected operations
/// never touched the store.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    records: RwLock<HashMap<String, Credential>>,
    mutations: AtomicU64,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes (insert/update/rename/remove) so far.
    pub fn mutations(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn get(&self, id: &str) -> AuthResult<Option<Credential>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(id).cloned())
    }

    fn insert(&self, credential: Credential) -> AuthResult<()> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if records.contains_key(&credential.id) {
            return Err(AuthError::conflict(format!(
                "credential already exists: {}",
                credential.id
            )));
        }
        records.insert(credential.id.clone(), credential);
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn update(&self, credential: Credential) -> AuthResult<()> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if !records.contains_key(&credential.id) {
            return Err(AuthError::NotFound);
        }
        records.insert(credential.id.clone(), credential);
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rename(&self, old_id: &str, new_id: &str) -> AuthResult<Credential> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if records.contains_key(new_id) {
            return Err(AuthError::conflict(format!(
                "credential already exists: {new_id}"
            )));
        }
        let mut credential = records.remove(old_id).ok_or(AuthError::NotFound)?;
        credential.id = new_id.to_string();
        records.insert(new_id.to_string(), credential.clone());
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(credential)
    }

    fn remove(&self, id: &str) -> AuthResult<Credential> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let credential = records.remove(id).ok_or(AuthError::NotFound)?;
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(credential)
    }
}
