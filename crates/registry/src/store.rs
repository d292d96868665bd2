//! Durable key-value backing store.
//!
//! The whole system persists through this one narrow interface: JSON
//! documents addressed by string keys, plus a prefix scan for the chat
//! record collections (`user:`, `message:`). Implementations must be
//! `Send + Sync`; they are shared across request handlers behind an `Arc`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Errors that can occur during backing-store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An I/O error from a persistent backend.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Backend-specific failure.
    #[error("backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

/// Trait for the durable key-value store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch a document by key. Returns `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Store a document under a key, replacing any existing value.
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Delete a document. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Fetch all documents whose key starts with `prefix`, in key order.
    async fn get_by_prefix(&self, prefix: &str) -> Result<Vec<Value>, StoreError>;
}

/// Fetch and decode a typed record.
pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Encode and store a typed record.
pub async fn set_typed<T: Serialize>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    store.set(key, serde_json::to_value(value)?).await
}

/// In-memory store backed by a `RwLock<BTreeMap>`.
///
/// The ordered map makes prefix scans a plain range walk. Used for tests
/// and single-process deployments; the trait is the seam where a real
/// database would plug in.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        debug!(key, "storing document");
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        debug!(key, "deleting document");
        self.entries.write().remove(key);
        Ok(())
    }

    async fn get_by_prefix(&self, prefix: &str) -> Result<Vec<Value>, StoreError> {
        let entries = self.entries.read();
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(_, v)| v.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let store = MemoryStore::new();
        store.set("user:alice", json!({"name": "Alice"})).await.unwrap();
        let value = store.get("user:alice").await.unwrap();
        assert_eq!(value, Some(json!({"name": "Alice"})));
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.set("k", json!(1)).await.unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_prefix_scan_honours_boundaries() {
        let store = MemoryStore::new();
        store.set("user:alice", json!("a")).await.unwrap();
        store.set("user:bob", json!("b")).await.unwrap();
        store.set("message:1", json!("m")).await.unwrap();
        store.set("userx", json!("x")).await.unwrap();

        let users = store.get_by_prefix("user:").await.unwrap();
        assert_eq!(users, vec![json!("a"), json!("b")]);
    }

    #[tokio::test]
    async fn test_typed_helpers() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Rec {
            n: u32,
        }

        let store = MemoryStore::new();
        set_typed(&store, "rec", &Rec { n: 7 }).await.unwrap();
        let back: Option<Rec> = get_typed(&store, "rec").await.unwrap();
        assert_eq!(back, Some(Rec { n: 7 }));
    }
}
