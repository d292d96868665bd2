//! Node lifecycle and membership state.
//!
//! The registry owns the node table behind a single mutex: toggles are
//! read-modify-write under that lock, readers get cloned snapshots, and
//! durable writes happen after the lock drops. The fixed five-node
//! membership is seeded on first boot and reloaded from the store on
//! every restart after that.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, info};

use corelib::{Node, NodeId, Placement};

use crate::error::RegistryError;
use crate::oplog::{OperationKind, OperationLog};
use crate::store::{get_typed, set_typed, KvStore, StoreError};

/// Store key under which the node-table snapshot is persisted.
pub const NODES_STORE_KEY: &str = "system:ring_nodes";

/// Result of a toggle: the flipped flag and the node as it now stands.
#[derive(Clone, Debug)]
pub struct ToggleOutcome {
    pub previous: bool,
    pub current: bool,
    pub node: Node,
}

/// A message's endpoints in ring-key form (`user:<name>`).
///
/// The payload itself is opaque to the placement engine; only `from`/`to`
/// matter for per-node message counts.
#[derive(Clone, Debug)]
pub struct MessageRef {
    pub from: String,
    pub to: String,
}

/// Process-wide node table with explicit load/save and one
/// mutual-exclusion domain.
pub struct NodeRegistry {
    nodes: Mutex<Vec<Node>>,
    placement: Placement,
    store: Arc<dyn KvStore>,
    log: Arc<OperationLog>,
}

impl NodeRegistry {
    pub fn new(store: Arc<dyn KvStore>, log: Arc<OperationLog>, placement: Placement) -> Self {
        Self {
            nodes: Mutex::new(Vec::new()),
            placement,
            store,
            log,
        }
    }

    /// The five fixed seed nodes, all active.
    pub fn seed_nodes() -> Vec<Node> {
        vec![
            Node::new(NodeId(1), "Node-Alpha"),
            Node::new(NodeId(2), "Node-Beta"),
            Node::new(NodeId(3), "Node-Gamma"),
            Node::new(NodeId(4), "Node-Delta"),
            Node::new(NodeId(5), "Node-Epsilon"),
        ]
    }

    /// Load the node table from the store, seeding it on first boot.
    ///
    /// Must complete before the service accepts placement or admin
    /// requests; there is no background seeding.
    pub async fn init(&self) -> Result<(), RegistryError> {
        match get_typed::<Vec<Node>>(&*self.store, NODES_STORE_KEY).await? {
            Some(persisted) => {
                info!(count = persisted.len(), "loaded node table from store");
                *self.nodes.lock() = persisted;
            }
            None => {
                let seeded = Self::seed_nodes();
                info!(count = seeded.len(), "first boot, seeding node table");
                set_typed(&*self.store, NODES_STORE_KEY, &seeded).await?;
                *self.nodes.lock() = seeded;
            }
        }
        Ok(())
    }

    /// The placement configuration this registry was built with.
    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// A consistent copy of the node table, safe for concurrent readers.
    pub fn snapshot(&self) -> Vec<Node> {
        self.nodes.lock().clone()
    }

    /// Flip a node's `active` flag.
    ///
    /// Atomic with respect to concurrent toggles and stats refreshes.
    /// Deactivating a node that currently holds keys also emits an
    /// informational `NODE_FAILOVER` entry naming those keys; nothing is
    /// migrated — the next stats refresh re-homes them against the reduced
    /// active set.
    pub async fn toggle_active(&self, id: NodeId) -> Result<ToggleOutcome, RegistryError> {
        let (outcome, table) = {
            let mut nodes = self.nodes.lock();
            let node = nodes
                .iter_mut()
                .find(|n| n.id == id)
                .ok_or(RegistryError::NodeNotFound(id))?;

            let previous = node.active;
            node.active = !node.active;
            let outcome = ToggleOutcome {
                previous,
                current: node.active,
                node: node.clone(),
            };
            (outcome, nodes.clone())
        };

        set_typed(&*self.store, NODES_STORE_KEY, &table).await?;

        let kind = if outcome.current {
            OperationKind::NodeActivated
        } else {
            OperationKind::NodeDeactivated
        };
        info!(node = %outcome.node.name, active = outcome.current, "toggled node");
        self.log
            .append(
                kind,
                json!({
                    "nodeId": outcome.node.id,
                    "nodeName": outcome.node.name,
                    "previousStatus": outcome.previous,
                    "newStatus": outcome.current,
                }),
            )
            .await?;

        if !outcome.current && !outcome.node.assigned_keys.is_empty() {
            self.log
                .append(
                    OperationKind::NodeFailover,
                    json!({
                        "deactivatedNode": outcome.node.name,
                        "affectedKeys": outcome.node.assigned_keys,
                        "message": "keys will be redistributed to active nodes",
                    }),
                )
                .await?;
        }

        Ok(outcome)
    }

    /// Recompute derived stats for every active node and persist the table.
    ///
    /// Full O(active x keys) pass: `assigned_keys` is the subset of
    /// `user_keys` whose primary is this node, `message_count` the number
    /// of messages touching any of those keys. Inactive nodes keep their
    /// last computed stats (that stale list is what a later failover entry
    /// reports). Returns the refreshed snapshot.
    pub async fn refresh_stats(
        &self,
        user_keys: &[String],
        messages: &[MessageRef],
    ) -> Result<Vec<Node>, RegistryError> {
        let table = {
            let mut nodes = self.nodes.lock();
            let view = nodes.clone();
            for node in nodes.iter_mut().filter(|n| n.active) {
                node.assigned_keys = user_keys
                    .iter()
                    .filter(|key| {
                        self.placement
                            .primary_of(key, &view)
                            .is_some_and(|p| p.id == node.id)
                    })
                    .cloned()
                    .collect();
                node.message_count = messages
                    .iter()
                    .filter(|m| {
                        node.assigned_keys.contains(&m.from) || node.assigned_keys.contains(&m.to)
                    })
                    .count() as u64;
            }
            nodes.clone()
        };

        debug!(keys = user_keys.len(), messages = messages.len(), "refreshed node stats");
        self.persist(&table).await?;
        Ok(table)
    }

    /// Persist the given node-table snapshot.
    pub async fn persist(&self, table: &[Node]) -> Result<(), StoreError> {
        set_typed(&*self.store, NODES_STORE_KEY, &table).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn build() -> (Arc<MemoryStore>, Arc<OperationLog>, NodeRegistry) {
        let store = Arc::new(MemoryStore::new());
        let log = Arc::new(OperationLog::new(store.clone()));
        let registry = NodeRegistry::new(store.clone(), log.clone(), Placement::default());
        (store, log, registry)
    }

    #[tokio::test]
    async fn test_first_boot_seeds_five_nodes() {
        let (store, _, registry) = build();
        registry.init().await.unwrap();

        let nodes = registry.snapshot();
        assert_eq!(nodes.len(), 5);
        assert!(nodes.iter().all(|n| n.active));
        assert_eq!(nodes[0].name, "Node-Alpha");
        assert_eq!(nodes[4].name, "Node-Epsilon");

        // The seed is persisted, not just in memory.
        let persisted: Vec<Node> = get_typed(&*store, NODES_STORE_KEY).await.unwrap().unwrap();
        assert_eq!(persisted.len(), 5);
    }

    #[tokio::test]
    async fn test_restart_reloads_instead_of_reseeding() {
        let (store, log, registry) = build();
        registry.init().await.unwrap();
        registry.toggle_active(NodeId(2)).await.unwrap();

        // Same store, fresh process state.
        let registry2 = NodeRegistry::new(store, log, Placement::default());
        registry2.init().await.unwrap();
        let node2 = registry2
            .snapshot()
            .into_iter()
            .find(|n| n.id == NodeId(2))
            .unwrap();
        assert!(!node2.active, "persisted toggle must survive restart");
    }

    #[tokio::test]
    async fn test_toggle_unknown_node() {
        let (_, _, registry) = build();
        registry.init().await.unwrap();
        let err = registry.toggle_active(NodeId(42)).await.unwrap_err();
        assert!(matches!(err, RegistryError::NodeNotFound(NodeId(42))));
    }

    #[tokio::test]
    async fn test_toggle_reports_previous_and_current() {
        let (_, log, registry) = build();
        registry.init().await.unwrap();

        let off = registry.toggle_active(NodeId(1)).await.unwrap();
        assert!(off.previous && !off.current);
        let on = registry.toggle_active(NodeId(1)).await.unwrap();
        assert!(!on.previous && on.current);

        let entries = log.list();
        assert_eq!(entries[0].operation, OperationKind::NodeActivated);
        assert_eq!(entries[1].operation, OperationKind::NodeDeactivated);
    }

    #[tokio::test]
    async fn test_deactivation_with_keys_emits_failover() {
        let (_, log, registry) = build();
        registry.init().await.unwrap();

        // user:alice is owned by node 5 under the seed membership.
        let keys = vec!["user:alice".to_string()];
        let messages = vec![MessageRef {
            from: "user:alice".to_string(),
            to: "user:bob".to_string(),
        }];
        registry.refresh_stats(&keys, &messages).await.unwrap();

        let node5 = registry
            .snapshot()
            .into_iter()
            .find(|n| n.id == NodeId(5))
            .unwrap();
        assert_eq!(node5.assigned_keys, vec!["user:alice".to_string()]);
        assert_eq!(node5.message_count, 1);

        registry.toggle_active(NodeId(5)).await.unwrap();

        let entries = log.list();
        assert_eq!(entries[0].operation, OperationKind::NodeFailover);
        assert_eq!(
            entries[0].details["affectedKeys"],
            serde_json::json!(["user:alice"])
        );
        assert_eq!(entries[1].operation, OperationKind::NodeDeactivated);

        // Placement against the new snapshot picks a different, active primary.
        let snapshot = registry.snapshot();
        let primary = registry
            .placement()
            .primary_of("user:alice", &snapshot)
            .unwrap();
        assert_eq!(primary.id, NodeId(4));
        assert!(primary.active);
    }

    #[tokio::test]
    async fn test_deactivation_without_keys_logs_no_failover() {
        let (_, log, registry) = build();
        registry.init().await.unwrap();
        registry.toggle_active(NodeId(3)).await.unwrap();

        let entries = log.list();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, OperationKind::NodeDeactivated);
    }

    #[tokio::test]
    async fn test_refresh_skips_inactive_nodes() {
        let (_, _, registry) = build();
        registry.init().await.unwrap();

        let keys = vec!["user:alice".to_string()];
        registry.refresh_stats(&keys, &[]).await.unwrap();
        registry.toggle_active(NodeId(5)).await.unwrap();

        // Refresh with the node down: its stale stats stay as they were,
        // while the key shows up on its new owner.
        registry.refresh_stats(&keys, &[]).await.unwrap();
        let snapshot = registry.snapshot();
        let node5 = snapshot.iter().find(|n| n.id == NodeId(5)).unwrap();
        let node4 = snapshot.iter().find(|n| n.id == NodeId(4)).unwrap();
        assert_eq!(node5.assigned_keys, vec!["user:alice".to_string()]);
        assert_eq!(node4.assigned_keys, vec!["user:alice".to_string()]);
    }
}
