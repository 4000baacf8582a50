//! Account/tenant directory collaborator contract.
//!
//! The directory is an external service; the auth core only depends on this
//! trait. The in-memory implementation backs tests/dev.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use campuskit_core::{AccountId, AuthError, AuthResult, TenantId};

/// Lifecycle status shared by accounts and tenant memberships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Created but not yet logged in; promoted to active on first login.
    Pending,
    Active,
    /// Never authorized, regardless of roles.
    Disabled,
}

/// An account's membership in one tenant (school).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantMembership {
    pub tenant_id: TenantId,
    pub display_name: String,
    pub status: AccountStatus,
    pub roles: Vec<String>,
}

/// Directory view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Login identity (email).
    pub identity: String,
    pub display_name: String,
    pub status: AccountStatus,
    /// Global (non-tenant-scoped) roles, e.g. the reserved `"all"` role.
    pub roles: Vec<String>,
    pub tenants: Vec<TenantMembership>,
}

impl Account {
    pub fn membership(&self, tenant_id: TenantId) -> Option<&TenantMembership> {
        self.tenants.iter().find(|t| t.tenant_id == tenant_id)
    }
}

/// Directory operations the auth core needs.
pub trait AccountDirectory: Send + Sync {
    /// `NotFound` when no account carries this identity.
    fn get_by_identity(&self, identity: &str) -> AuthResult<Account>;

    fn set_status(&self, account_id: AccountId, status: AccountStatus) -> AuthResult<()>;

    fn set_tenant_status(
        &self,
        account_id: AccountId,
        tenant_id: TenantId,
        status: AccountStatus,
    ) -> AuthResult<()>;

    fn add_tenant_role(
        &self,
        account_id: AccountId,
        tenant_id: TenantId,
        role: &str,
    ) -> AuthResult<()>;

    fn remove_tenant_role(
        &self,
        account_id: AccountId,
        tenant_id: TenantId,
        role: &str,
    ) -> AuthResult<()>;
}

/// In-memory directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    accounts: RwLock<HashMap<AccountId, Account>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, account: Account) {
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        accounts.insert(account.id, account);
    }

    pub fn get(&self, account_id: AccountId) -> Option<Account> {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        accounts.get(&account_id).cloned()
    }

    fn with_account<R>(
        &self,
        account_id: AccountId,
        f: impl FnOnce(&mut Account) -> AuthResult<R>,
    ) -> AuthResult<R> {
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        let account = accounts.get_mut(&account_id).ok_or(AuthError::NotFound)?;
        f(account)
    }
}

impl AccountDirectory for InMemoryDirectory {
    fn get_by_identity(&self, identity: &str) -> AuthResult<Account> {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        accounts
            .values()
            .find(|a| a.identity == identity)
            .cloned()
            .ok_or(AuthError::NotFound)
    }

    fn set_status(&self, account_id: AccountId, status: AccountStatus) -> AuthResult<()> {
        self.with_account(account_id, |account| {
            account.status = status;
            Ok(())
        })
    }

    fn set_tenant_status(
        &self,
        account_id: AccountId,
        tenant_id: TenantId,
        status: AccountStatus,
    ) -> AuthResult<()> {
        self.with_account(account_id, |account| {
            let membership = account
                .tenants
                .iter_mut()
                .find(|t| t.tenant_id == tenant_id)
                .ok_or(AuthError::NotFound)?;
            membership.status = status;
            Ok(())
        })
    }

    fn add_tenant_role(
        &self,
        account_id: AccountId,
        tenant_id: TenantId,
        role: &str,
    ) -> AuthResult<()> {
        self.with_account(account_id, |account| {
            let membership = account
                .tenants
                .iter_mut()
                .find(|t| t.tenant_id == tenant_id)
                .ok_or(AuthError::NotFound)?;
            if !membership.roles.iter().any(|r| r == role) {
                membership.roles.push(role.to_string());
            }
            Ok(())
        })
    }

    fn remove_tenant_role(
        &self,
        account_id: AccountId,
        tenant_id: TenantId,
        role: &str,
    ) -> AuthResult<()> {
        self.with_account(account_id, |account| {
            let membership = account
                .tenants
                .iter_mut()
                .find(|t| t.tenant_id == tenant_id)
                .ok_or(AuthError::NotFound)?;
            membership.roles.retain(|r| r != role);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(identity: &str, tenant_id: TenantId) -> Account {
        Account {
            id: AccountId::new(),
            identity: identity.to_string(),
            display_name: "Test Account".to_string(),
            status: AccountStatus::Pending,
            roles: Vec::new(),
            tenants: vec![TenantMembership {
                tenant_id,
                display_name: "Test School".to_string(),
                status: AccountStatus::Pending,
                roles: vec!["student".to_string()],
            }],
        }
    }

    #[test]
    fn get_by_identity_finds_accounts() {
        let dir = InMemoryDirectory::new();
        dir.upsert(account("alice@example.com", TenantId::new()));

        assert!(dir.get_by_identity("alice@example.com").is_ok());
        assert_eq!(
            dir.get_by_identity("ghost@example.com").unwrap_err(),
            AuthError::NotFound
        );
    }

    #[test]
    fn status_transitions_are_applied() {
        let dir = InMemoryDirectory::new();
        let tenant = TenantId::new();
        let a = account("alice@example.com", tenant);
        let id = a.id;
        dir.upsert(a);

        dir.set_status(id, AccountStatus::Active).unwrap();
        dir.set_tenant_status(id, tenant, AccountStatus::Active).unwrap();

        let stored = dir.get(id).unwrap();
        assert_eq!(stored.status, AccountStatus::Active);
        assert_eq!(stored.tenants[0].status, AccountStatus::Active);
    }

    #[test]
    fn tenant_roles_are_added_and_removed_idempotently() {
        let dir = InMemoryDirectory::new();
        let tenant = TenantId::new();
        let a = account("alice@example.com", tenant);
        let id = a.id;
        dir.upsert(a);

        dir.add_tenant_role(id, tenant, "teacher").unwrap();
        dir.add_tenant_role(id, tenant, "teacher").unwrap();
        assert_eq!(dir.get(id).unwrap().tenants[0].roles, vec!["student", "teacher"]);

        dir.remove_tenant_role(id, tenant, "student").unwrap();
        assert_eq!(dir.get(id).unwrap().tenants[0].roles, vec!["teacher"]);
    }

    #[test]
    fn unknown_tenant_membership_is_not_found() {
        let dir = InMemoryDirectory::new();
        let a = account("alice@example.com", TenantId::new());
        let id = a.id;
        dir.upsert(a);

        assert_eq!(
            dir.set_tenant_status(id, TenantId::new(), AccountStatus::Active)
                .unwrap_err(),
            AuthError::NotFound
        );
    }
}
