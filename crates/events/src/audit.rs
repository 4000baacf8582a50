//! Audit event emission.
//!
//! Audit events carry the *internal* reason for a decision. Login failures in
//! particular raise distinguishable events ("Login failed" / "No user" /
//! "User is disabled") while the caller sees one generic message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
}

/// A single audit record.
///
/// Events are immutable facts; sinks must treat them as append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Emitting service (e.g. "auth").
    pub service: String,

    /// Stable action name (e.g. "login", "login.failed").
    pub action: String,

    /// Subject of the event (usually the identity involved).
    pub target: String,

    /// Free-form structured detail. Internal only; may contain the specific
    /// failure reason that the external response deliberately omits.
    pub args: Value,

    pub severity: Severity,

    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        service: impl Into<String>,
        action: impl Into<String>,
        target: impl Into<String>,
        args: Value,
    ) -> Self {
        Self {
            service: service.into(),
            action: action.into(),
            target: target.into(),
            args,
            severity: Severity::Info,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

/// Sink for audit events.
///
/// Emission is fire-and-forget from the caller's perspective: a sink failure
/// must never fail the operation that raised the event.
pub trait AuditSink: Send + Sync {
    fn raise(&self, event: AuditEvent) -> anyhow::Result<()>;
}

/// In-memory audit log for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    events: std::sync::Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything raised so far, in order.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Actions raised so far (convenience for assertions).
    pub fn actions(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.action).collect()
    }
}

impl AuditSink for InMemoryAuditLog {
    fn raise(&self, event: AuditEvent) -> anyhow::Result<()> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| anyhow::anyhow!("audit log lock poisoned"))?;
        events.push(event);
        Ok(())
    }
}
