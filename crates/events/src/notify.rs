//! Change notifications for downstream denormalizers.
//!
//! - Best-effort fan-out; delivery failures are logged by the caller and
//!   swallowed (the primary mutation already succeeded).
//! - At-least-once acceptable; consumers must be idempotent.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What happened to the notified objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// Fire-and-forget change notification contract.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: ChangeKind, objects: &[Value]) -> anyhow::Result<()>;
}

/// In-memory notifier for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    sent: std::sync::Mutex<Vec<(ChangeKind, Vec<Value>)>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(ChangeKind, Vec<Value>)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Notifier for InMemoryNotifier {
    fn notify(&self, kind: ChangeKind, objects: &[Value]) -> anyhow::Result<()> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| anyhow::anyhow!("notifier lock poisoned"))?;
        sent.push((kind, objects.to_vec()));
        Ok(())
    }
}

/// Notifier that always fails; used to exercise best-effort swallowing.
#[derive(Debug, Default)]
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _kind: ChangeKind, _objects: &[Value]) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("notification transport unavailable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_notifications() {
        let n = InMemoryNotifier::new();
        n.notify(ChangeKind::Modified, &[json!({"id": "a@x.io"})])
            .unwrap();

        let sent = n.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ChangeKind::Modified);
    }
}
