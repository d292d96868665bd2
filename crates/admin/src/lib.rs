//! Admin read views over the placement engine.
//!
//! [`AdminQueryService`] composes the node registry with the chat
//! collaborators (user directory, message feed) into the two views the
//! admin UI polls: the node table and the per-key distribution map. Both
//! are computed fresh on every call — there is no cache, so callers pay
//! the full recomputation cost each time.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use corelib::{Node, NodeId, Placement};
use registry::{MessageRef, NodeRegistry, RegistryError, StoreError};

/// Source of the user keys placed on the ring.
///
/// Keys are full ring keys (`user:<name>`); prefixing happens on the chat
/// side so the placement domain only ever sees one key shape.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Every known user key.
    async fn user_keys(&self) -> Result<Vec<String>, StoreError>;

    /// Display name for a user key, if the user exists.
    async fn display_name(&self, key: &str) -> Result<Option<String>, StoreError>;
}

/// Source of message endpoints, also in ring-key form.
#[async_trait]
pub trait MessageFeed: Send + Sync {
    async fn message_refs(&self) -> Result<Vec<MessageRef>, StoreError>;
}

/// Placement summary for a single user key in the distribution view.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPlacement {
    /// The user's display name.
    pub name: String,
    /// Primary node name, or `"None"` when no node is active.
    pub primary_node: String,
    pub primary_node_id: Option<NodeId>,
    pub replica_nodes: Vec<String>,
    pub ring_position: u32,
}

/// Read-view service for the admin endpoints.
pub struct AdminQueryService {
    registry: Arc<NodeRegistry>,
    directory: Arc<dyn UserDirectory>,
    messages: Arc<dyn MessageFeed>,
    placement: Placement,
}

impl AdminQueryService {
    pub fn new(
        registry: Arc<NodeRegistry>,
        directory: Arc<dyn UserDirectory>,
        messages: Arc<dyn MessageFeed>,
    ) -> Self {
        let placement = registry.placement();
        Self {
            registry,
            directory,
            messages,
            placement,
        }
    }

    /// The node table with freshly recomputed stats, persisted and returned.
    pub async fn nodes_view(&self) -> Result<Vec<Node>, RegistryError> {
        let keys = self.directory.user_keys().await?;
        let messages = self.messages.message_refs().await?;
        self.registry.refresh_stats(&keys, &messages).await
    }

    /// Per-key placement map: primary, replicas, and ring position for
    /// every known user key.
    pub async fn distribution_view(
        &self,
    ) -> Result<BTreeMap<String, KeyPlacement>, RegistryError> {
        let keys = self.directory.user_keys().await?;
        let nodes = self.registry.snapshot();
        debug!(keys = keys.len(), "computing distribution view");

        let mut distribution = BTreeMap::new();
        for key in keys {
            let primary = self.placement.primary_of(&key, &nodes);
            let replicas = self.placement.replicas_of(&key, &nodes);
            let name = self
                .directory
                .display_name(&key)
                .await?
                .unwrap_or_default();

            distribution.insert(
                key.clone(),
                KeyPlacement {
                    name,
                    primary_node: primary.map_or_else(|| "None".to_string(), |n| n.name.clone()),
                    primary_node_id: primary.map(|n| n.id),
                    replica_nodes: replicas.iter().map(|n| n.name.clone()).collect(),
                    ring_position: self.placement.position(&key),
                },
            );
        }
        Ok(distribution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry::{MemoryStore, OperationLog};

    struct FixedUsers(Vec<(String, String)>);

    #[async_trait]
    impl UserDirectory for FixedUsers {
        async fn user_keys(&self) -> Result<Vec<String>, StoreError> {
            Ok(self.0.iter().map(|(k, _)| k.clone()).collect())
        }

        async fn display_name(&self, key: &str) -> Result<Option<String>, StoreError> {
            Ok(self
                .0
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, n)| n.clone()))
        }
    }

    struct FixedMessages(Vec<MessageRef>);

    #[async_trait]
    impl MessageFeed for FixedMessages {
        async fn message_refs(&self) -> Result<Vec<MessageRef>, StoreError> {
            Ok(self.0.clone())
        }
    }

    async fn service_with(
        users: Vec<(String, String)>,
        messages: Vec<MessageRef>,
    ) -> (Arc<NodeRegistry>, AdminQueryService) {
        let store = Arc::new(MemoryStore::new());
        let log = Arc::new(OperationLog::new(store.clone()));
        let registry = Arc::new(NodeRegistry::new(store, log, Placement::default()));
        registry.init().await.unwrap();
        let service = AdminQueryService::new(
            registry.clone(),
            Arc::new(FixedUsers(users)),
            Arc::new(FixedMessages(messages)),
        );
        (registry, service)
    }

    #[tokio::test]
    async fn test_nodes_view_refreshes_stats() {
        let (_, service) = service_with(
            vec![("user:alice".to_string(), "Alice".to_string())],
            vec![MessageRef {
                from: "user:alice".to_string(),
                to: "user:bob".to_string(),
            }],
        )
        .await;

        let nodes = service.nodes_view().await.unwrap();
        let node5 = nodes.iter().find(|n| n.id == NodeId(5)).unwrap();
        assert_eq!(node5.assigned_keys, vec!["user:alice".to_string()]);
        assert_eq!(node5.message_count, 1);
    }

    #[tokio::test]
    async fn test_distribution_view_fields() {
        let (_, service) = service_with(
            vec![("user:alice".to_string(), "Alice".to_string())],
            vec![],
        )
        .await;

        let distribution = service.distribution_view().await.unwrap();
        let entry = &distribution["user:alice"];
        assert_eq!(entry.name, "Alice");
        assert_eq!(entry.primary_node, "Node-Epsilon");
        assert_eq!(entry.primary_node_id, Some(NodeId(5)));
        assert_eq!(
            entry.replica_nodes,
            vec!["Node-Epsilon", "Node-Delta", "Node-Gamma"]
        );
        assert_eq!(entry.ring_position, 17);
    }

    #[tokio::test]
    async fn test_distribution_view_with_no_active_nodes() {
        let (registry, service) = service_with(
            vec![("user:alice".to_string(), "Alice".to_string())],
            vec![],
        )
        .await;
        for id in 1..=5 {
            registry.toggle_active(NodeId(id)).await.unwrap();
        }

        let distribution = service.distribution_view().await.unwrap();
        let entry = &distribution["user:alice"];
        assert_eq!(entry.primary_node, "None");
        assert_eq!(entry.primary_node_id, None);
        assert!(entry.replica_nodes.is_empty());
    }
}
