//! `campuskit-events` — audit and change-notification collaborator contracts.
//!
//! The auth core emits two kinds of side-channel traffic:
//!
//! - **audit events**: who did what, with internally-detailed reasons that are
//!   never echoed back to callers;
//! - **change notifications**: fire-and-forget added/modified/removed signals
//!   consumed by the (out-of-scope) denormalization framework.
//!
//! Both are contracts plus in-memory implementations for tests/dev. Real
//! deployments plug transport-backed implementations in behind the same traits.

pub mod audit;
pub mod notify;

pub use audit::{AuditEvent, AuditSink, InMemoryAuditLog, Severity};
pub use notify::{ChangeKind, FailingNotifier, InMemoryNotifier, Notifier};
