//! Bounded, append-only operation log.
//!
//! Entries are ordered newest-first and capped at [`LOG_CAPACITY`]; once
//! full, the oldest entries fall off the tail. Eviction is routine, not an
//! error. Entries are immutable after append; the only other mutation is
//! an explicit [`OperationLog::clear`].

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::store::{get_typed, set_typed, KvStore, StoreError};
use crate::now_ms;

/// Maximum number of retained entries.
pub const LOG_CAPACITY: usize = 100;

/// Store key under which the log snapshot is persisted.
pub const LOG_STORE_KEY: &str = "system:operation_logs";

/// Kinds of logged operations.
///
/// The first three are emitted by the registry itself; the rest originate
/// from the profile/account collaborators and flow through the same sink.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    NodeActivated,
    NodeDeactivated,
    NodeFailover,
    ProfileUpdated,
    PasswordChanged,
    AccountDeleted,
}

/// One immutable log entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Epoch milliseconds at append time.
    pub timestamp: u64,
    pub operation: OperationKind,
    /// Structured payload; shape varies per operation kind.
    pub details: Value,
}

/// Process-wide audit log with its own mutual-exclusion domain.
///
/// Appends mutate under the mutex, then persist the resulting snapshot
/// after the lock is released. A persistence failure is surfaced — the
/// audit trail's integrity depends on durable writes succeeding.
pub struct OperationLog {
    entries: Mutex<VecDeque<LogEntry>>,
    store: Arc<dyn KvStore>,
}

impl OperationLog {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            store,
        }
    }

    /// Restore the persisted log, if any. Called once at startup before
    /// the service accepts requests.
    pub async fn load(&self) -> Result<(), StoreError> {
        if let Some(persisted) = get_typed::<Vec<LogEntry>>(&*self.store, LOG_STORE_KEY).await? {
            let mut entries = self.entries.lock();
            *entries = persisted.into();
            entries.truncate(LOG_CAPACITY);
        }
        Ok(())
    }

    /// Append an entry at the front, evicting the oldest past capacity,
    /// then persist the new snapshot.
    pub async fn append(&self, operation: OperationKind, details: Value) -> Result<(), StoreError> {
        let entry = LogEntry {
            timestamp: now_ms(),
            operation,
            details,
        };
        let snapshot: Vec<LogEntry> = {
            let mut entries = self.entries.lock();
            entries.push_front(entry);
            entries.truncate(LOG_CAPACITY);
            entries.iter().cloned().collect()
        };
        debug!(?operation, len = snapshot.len(), "appended operation log entry");
        set_typed(&*self.store, LOG_STORE_KEY, &snapshot).await
    }

    /// All retained entries, newest first.
    pub fn list(&self) -> Vec<LogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Drop every entry and persist the empty log.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.entries.lock().clear();
        debug!("cleared operation log");
        set_typed(&*self.store, LOG_STORE_KEY, &Vec::<LogEntry>::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn new_log() -> OperationLog {
        OperationLog::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_append_orders_newest_first() {
        let log = new_log();
        for i in 0..3 {
            log.append(OperationKind::NodeActivated, json!({ "seq": i }))
                .await
                .unwrap();
        }
        let entries = log.list();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].details, json!({ "seq": 2 }));
        assert_eq!(entries[2].details, json!({ "seq": 0 }));
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let log = new_log();
        for i in 0..150u32 {
            log.append(OperationKind::NodeDeactivated, json!({ "seq": i }))
                .await
                .unwrap();
        }
        let entries = log.list();
        assert_eq!(entries.len(), LOG_CAPACITY);
        // The 100 most recent survive: 149 down to 50.
        assert_eq!(entries[0].details, json!({ "seq": 149 }));
        assert_eq!(entries[99].details, json!({ "seq": 50 }));
    }

    #[tokio::test]
    async fn test_clear_empties_log_and_store() {
        let store = Arc::new(MemoryStore::new());
        let log = OperationLog::new(store.clone());
        log.append(OperationKind::NodeFailover, json!({})).await.unwrap();
        log.clear().await.unwrap();
        assert!(log.list().is_empty());

        // A reload sees the cleared state, not the old entry.
        let reloaded = OperationLog::new(store);
        reloaded.load().await.unwrap();
        assert!(reloaded.list().is_empty());
    }

    #[tokio::test]
    async fn test_load_restores_persisted_entries() {
        let store = Arc::new(MemoryStore::new());
        {
            let log = OperationLog::new(store.clone());
            log.append(OperationKind::NodeActivated, json!({ "nodeId": 1 }))
                .await
                .unwrap();
        }
        let log = OperationLog::new(store);
        log.load().await.unwrap();
        let entries = log.list();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, OperationKind::NodeActivated);
    }

    #[test]
    fn test_operation_kind_wire_names() {
        let value = serde_json::to_value(OperationKind::NodeFailover).unwrap();
        assert_eq!(value, json!("NODE_FAILOVER"));
        let back: OperationKind = serde_json::from_value(json!("PROFILE_UPDATED")).unwrap();
        assert_eq!(back, OperationKind::ProfileUpdated);
    }
}
