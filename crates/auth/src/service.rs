//! AuthService orchestration: login, request validation, credential changes,
//! and capability-token flows.
//!
//! External failure surface is deliberately coarse: login failures and token
//! failures come back as fixed generic messages, while the audit log records
//! the internally distinguishable reason.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::warn;

use campuskit_core::{AccountId, AuthError, AuthResult, DenyReason, TenantId};
use campuskit_events::{AuditEvent, AuditSink, ChangeKind, Notifier, Severity};

use crate::directory::{Account, AccountDirectory, AccountStatus};
use crate::policy::{self, PolicyTable, RouteRequest};
use crate::provider::CredentialProvider;
use crate::token::{CapabilityKind, TokenService};

const SERVICE_NAME: &str = "auth";

/// Login request body.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub id: String,
    pub password: String,
}

/// Fixed response projection for a successful login. Hash and salt never
/// appear here.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub account_id: AccountId,
    pub identity: String,
    pub display_name: String,
    pub status: AccountStatus,
    pub tenants: Vec<TenantSummary>,
    /// Opaque bearer value; clients resend it unmodified.
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantSummary {
    pub tenant_id: TenantId,
    pub display_name: String,
    pub roles: Vec<String>,
}

/// Outcome of a successful `validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthzContext {
    pub principal_id: AccountId,
    pub principal_name: String,
    /// Present when the decision was scoped to a tenant membership; global
    /// grants carry no tenant context.
    pub tenant_display_name: Option<String>,
}

/// Orchestrates the credential provider, account directory, token service, and
/// policy table behind the two entry points (`login`, `validate`) plus the
/// credential-mutation and capability flows.
pub struct AuthService {
    provider: Box<dyn CredentialProvider>,
    directory: Arc<dyn AccountDirectory>,
    tokens: TokenService,
    policy: PolicyTable,
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn Notifier>,
}

impl AuthService {
    pub fn new(
        provider: Box<dyn CredentialProvider>,
        directory: Arc<dyn AccountDirectory>,
        tokens: TokenService,
        policy: PolicyTable,
        audit: Arc<dyn AuditSink>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            provider,
            directory,
            tokens,
            policy,
            audit,
            notifier,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    // ─────────────────────────────────────────────────────────────────────
    // Login
    // ─────────────────────────────────────────────────────────────────────

    /// Authenticate and issue an opaque bearer token.
    ///
    /// All credential failures surface as one generic `InvalidCredentials`;
    /// the audit log carries the distinguishing reason. Lifecycle promotion
    /// failures are `Internal` — they happen after credentials verified, so
    /// folding them into the generic 401 would misreport the cause.
    pub fn login(&self, request: &LoginRequest) -> AuthResult<LoginResponse> {
        if request.id.trim().is_empty() || request.password.is_empty() {
            return Err(AuthError::validation("id and password are required"));
        }

        let credential = match self.provider.login(&request.id, &request.password) {
            Ok(credential) => credential,
            Err(_) => {
                self.audit_login_failure(&request.id, "Login failed");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let mut account = match self.directory.get_by_identity(&request.id) {
            Ok(account) => account,
            Err(AuthError::NotFound) => {
                self.audit_login_failure(&request.id, "No user");
                return Err(AuthError::InvalidCredentials);
            }
            Err(err) => return Err(err),
        };

        if account.status == AccountStatus::Disabled {
            self.audit_login_failure(&request.id, "User is disabled");
            return Err(AuthError::InvalidCredentials);
        }

        self.activate_pending(&mut account)?;

        let token = self
            .tokens
            .issue(&account.identity, credential.account_id, None)?;

        self.raise(
            AuditEvent::new(
                SERVICE_NAME,
                "login",
                account.identity.as_str(),
                json!({ "account_id": account.id }),
            ),
        );

        Ok(LoginResponse {
            account_id: account.id,
            identity: account.identity,
            display_name: account.display_name,
            status: account.status,
            tenants: account
                .tenants
                .into_iter()
                .map(|t| TenantSummary {
                    tenant_id: t.tenant_id,
                    display_name: t.display_name,
                    roles: t.roles,
                })
                .collect(),
            token,
        })
    }

    /// Promote a pending account and any pending memberships to active.
    ///
    /// Idempotent: setting active twice is harmless, so a retried login after
    /// a partial promotion converges.
    fn activate_pending(&self, account: &mut Account) -> AuthResult<()> {
        if account.status == AccountStatus::Pending {
            self.directory
                .set_status(account.id, AccountStatus::Active)
                .map_err(|e| AuthError::internal(format!("account activation failed: {e}")))?;
            account.status = AccountStatus::Active;
        }
        for membership in &mut account.tenants {
            if membership.status == AccountStatus::Pending {
                self.directory
                    .set_tenant_status(account.id, membership.tenant_id, AccountStatus::Active)
                    .map_err(|e| {
                        AuthError::internal(format!("membership activation failed: {e}"))
                    })?;
                membership.status = AccountStatus::Active;
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Validate
    // ─────────────────────────────────────────────────────────────────────

    /// Gate a protected request: unwrap the opaque bearer value, verify the
    /// inner signature, resolve the account, and run the policy decision.
    pub fn validate(&self, opaque: &str, req: &RouteRequest<'_>) -> AuthResult<AuthzContext> {
        let claims = self.tokens.open(opaque)?;
        if claims.kind.is_some() {
            // Capability tokens are not bearer tokens.
            return Err(AuthError::Unauthorized(DenyReason::InvalidToken));
        }

        // Directory failures propagate with their own status (404/500).
        let account = self.directory.get_by_identity(&claims.sub)?;

        if account.status == AccountStatus::Disabled {
            return Err(AuthError::Unauthorized(DenyReason::AccountDisabled));
        }

        let membership =
            policy::authorize(&self.policy, &account, req).map_err(AuthError::Unauthorized)?;

        Ok(AuthzContext {
            principal_id: account.id,
            principal_name: account.display_name.clone(),
            tenant_display_name: membership.map(|m| m.display_name.clone()),
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Credential mutations
    // ─────────────────────────────────────────────────────────────────────

    /// Change a password. The new password must differ from the current one;
    /// the check runs before any store mutation.
    pub fn change_password(&self, id: &str, new_password: &str) -> AuthResult<()> {
        if new_password.is_empty() {
            return Err(AuthError::validation("password is required"));
        }
        if self.provider.password_matches(id, new_password)? {
            return Err(AuthError::validation(
                "new password must differ from the current password",
            ));
        }

        self.provider.change_password(id, new_password)?;
        self.notify(ChangeKind::Modified, vec![json!({ "id": id })]);
        self.raise(AuditEvent::new(
            SERVICE_NAME,
            "password.changed",
            id,
            Value::Null,
        ));
        Ok(())
    }

    /// Self-service identifier (email) change.
    pub fn change_identifier(
        &self,
        caller_id: &str,
        old_id: &str,
        new_id: &str,
    ) -> AuthResult<()> {
        if new_id.trim().is_empty() {
            return Err(AuthError::validation("identifier is required"));
        }

        self.provider.change_identifier(caller_id, old_id, new_id)?;
        self.notify(
            ChangeKind::Modified,
            vec![json!({ "id": new_id, "previous": old_id })],
        );
        self.raise(AuditEvent::new(
            SERVICE_NAME,
            "identifier.changed",
            new_id,
            json!({ "previous": old_id }),
        ));
        Ok(())
    }

    /// Cascading-delete hook: remove the credential when the owning account is
    /// deleted.
    pub fn delete_credential(&self, id: &str) -> AuthResult<()> {
        self.provider.delete(id)?;
        self.notify(ChangeKind::Removed, vec![json!({ "id": id })]);
        self.raise(AuditEvent::new(
            SERVICE_NAME,
            "credential.removed",
            id,
            Value::Null,
        ));
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Capability tokens
    // ─────────────────────────────────────────────────────────────────────

    /// Mint a single-purpose reset token for an existing account. Delivery
    /// (email) is out of scope; the caller mails the returned opaque value.
    pub fn request_password_reset(&self, identity: &str) -> AuthResult<String> {
        let account = self.directory.get_by_identity(identity)?;
        let token = self
            .tokens
            .issue(identity, account.id, Some(CapabilityKind::ResetPassword))?;
        self.raise(AuditEvent::new(
            SERVICE_NAME,
            "password.reset.requested",
            identity,
            Value::Null,
        ));
        Ok(token)
    }

    /// Mint an invite token for an identity that may not yet hold a
    /// credential.
    pub fn issue_invite(&self, identity: &str, account_id: AccountId) -> AuthResult<String> {
        let token = self
            .tokens
            .issue(identity, account_id, Some(CapabilityKind::Invite))?;
        self.raise(AuditEvent::new(
            SERVICE_NAME,
            "invite.issued",
            identity,
            json!({ "account_id": account_id }),
        ));
        Ok(token)
    }

    /// Redeem a reset or invite token and set the password.
    ///
    /// Decrypt and verification failures are generic 401s — expired and forged
    /// tokens are indistinguishable to the caller. Invite redemption creates
    /// the credential on first use.
    pub fn redeem_password_reset(&self, opaque: &str, new_password: &str) -> AuthResult<()> {
        if new_password.is_empty() {
            return Err(AuthError::validation("password is required"));
        }

        let claims = self.tokens.open(opaque)?;
        if claims.kind.is_none() {
            // A bearer token does not carry reset rights.
            return Err(AuthError::Unauthorized(DenyReason::InvalidToken));
        }

        match self.provider.get(&claims.sub)? {
            Some(_) => {
                self.provider.change_password(&claims.sub, new_password)?;
                self.notify(ChangeKind::Modified, vec![json!({ "id": claims.sub })]);
            }
            None => {
                self.provider
                    .create(&claims.sub, new_password, claims.account_id)?;
                self.notify(ChangeKind::Added, vec![json!({ "id": claims.sub })]);
            }
        }

        self.raise(AuditEvent::new(
            SERVICE_NAME,
            "password.reset.completed",
            claims.sub.as_str(),
            Value::Null,
        ));
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Side channels (best-effort)
    // ─────────────────────────────────────────────────────────────────────

    fn audit_login_failure(&self, identity: &str, reason: &str) {
        self.raise(
            AuditEvent::new(
                SERVICE_NAME,
                "login.failed",
                identity,
                json!({ "reason": reason }),
            )
            .with_severity(Severity::Warning),
        );
    }

    fn raise(&self, event: AuditEvent) {
        if let Err(err) = self.audit.raise(event) {
            warn!(error = %err, "audit event dropped");
        }
    }

    fn notify(&self, kind: ChangeKind, objects: Vec<Value>) {
        // The primary mutation already succeeded; propagation is best-effort.
        if let Err(err) = self.notifier.notify(kind, &objects) {
            warn!(error = %err, "change notification dropped");
        }
    }
}
