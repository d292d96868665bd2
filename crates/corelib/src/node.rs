//! Node identity and the persisted node record.
//!
//! Nodes are in-process placeholders for storage units; there is no real
//! transport behind them. Identity is the numeric `NodeId`; the stats
//! fields are derived and recomputed on demand, never mutated directly.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Compact identifier for a node in the cluster.
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A logical storage node.
///
/// `active` is the only externally mutable field (via the registry's
/// toggle). `assigned_keys` and `message_count` are refreshed as a whole
/// on each stats pass and otherwise carry the last computed snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Human-readable name, e.g. `Node-Alpha`.
    pub name: String,
    pub active: bool,
    /// Ring keys currently owned by this node (derived).
    #[serde(default)]
    pub assigned_keys: Vec<String>,
    /// Messages touching any owned key (derived).
    #[serde(default)]
    pub message_count: u64,
}

impl Node {
    /// Construct a new active node with empty stats.
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            active: true,
            assigned_keys: Vec::new(),
            message_count: 0,
        }
    }

    /// The string hashed to place this node on the ring.
    pub fn ring_key(&self) -> String {
        format!("node:{}", self.id)
    }
}
