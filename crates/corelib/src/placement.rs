//! Primary and replica lookup over an active-node snapshot.
//!
//! Placement is pure: given the same node snapshot and key, every query
//! returns the same answer. The ring is rebuilt per query from the active
//! nodes — at five nodes this is cheaper than keeping an index coherent
//! across toggles.
//!
//! # Algorithm
//!
//! 1. Filter to active nodes and hash each one at `node:<id>`.
//! 2. Sort ascending by ring position (stable, so equal positions keep
//!    snapshot order).
//! 3. Successor rule: the first node whose position is `>=` the key's
//!    position owns the key; if none qualifies, wrap to the smallest.
//! 4. Replicas continue clockwise from the primary until
//!    `min(factor, active_count)` distinct nodes are collected.

use crate::hash::{ring_position, DEFAULT_RING_SIZE};
use crate::node::{Node, NodeId};

/// Default number of nodes (primary included) assigned to a key.
pub const DEFAULT_REPLICATION_FACTOR: usize = 3;

/// A node's position on the ring, computed for one query.
///
/// Ephemeral: entries exist only for active nodes and are recomputed on
/// every lookup, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingEntry {
    pub node_id: NodeId,
    pub position: u32,
}

/// Full placement answer for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementResult {
    pub ring_position: u32,
    /// Always equal to `replicas[0]`.
    pub primary: NodeId,
    /// Distinct node ids, primary first, clockwise order.
    pub replicas: Vec<NodeId>,
}

/// Placement configuration: ring size and replication factor.
///
/// An empty active set is a valid capacity condition, not an error:
/// lookups return `None` / empty. Key validation (empty or malformed
/// keys) is the caller's job and never reaches this type.
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    ring_size: u32,
    replication_factor: usize,
}

impl Default for Placement {
    fn default() -> Self {
        Self::new(DEFAULT_RING_SIZE, DEFAULT_REPLICATION_FACTOR)
    }
}

impl Placement {
    pub fn new(ring_size: u32, replication_factor: usize) -> Self {
        Self {
            ring_size,
            replication_factor,
        }
    }

    pub fn ring_size(&self) -> u32 {
        self.ring_size
    }

    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    /// Ring position of an arbitrary key.
    pub fn position(&self, key: &str) -> u32 {
        ring_position(key, self.ring_size)
    }

    /// Active nodes sorted by ring position.
    pub fn ring_entries(&self, nodes: &[Node]) -> Vec<RingEntry> {
        let mut entries: Vec<RingEntry> = nodes
            .iter()
            .filter(|n| n.active)
            .map(|n| RingEntry {
                node_id: n.id,
                position: self.position(&n.ring_key()),
            })
            .collect();
        entries.sort_by_key(|e| e.position);
        entries
    }

    /// The node owning `key`, or `None` if no node is active.
    pub fn primary_of<'a>(&self, key: &str, nodes: &'a [Node]) -> Option<&'a Node> {
        let entries = self.ring_entries(nodes);
        let id = self.successor(key, &entries)?;
        nodes.iter().find(|n| n.id == id)
    }

    /// Distinct replica nodes for `key`, primary first.
    ///
    /// Returns `min(replication_factor, active_count)` nodes; empty when
    /// nothing is active.
    pub fn replicas_of<'a>(&self, key: &str, nodes: &'a [Node]) -> Vec<&'a Node> {
        let entries = self.ring_entries(nodes);
        let Some(primary) = self.successor(key, &entries) else {
            return Vec::new();
        };

        // Positions are one-per-node, so walking indices yields distinct
        // nodes without a seen-set.
        let start = entries
            .iter()
            .position(|e| e.node_id == primary)
            .unwrap_or(0);
        let count = self.replication_factor.min(entries.len());

        (0..count)
            .map(|i| entries[(start + i) % entries.len()].node_id)
            .filter_map(|id| nodes.iter().find(|n| n.id == id))
            .collect()
    }

    /// Position, primary, and replica set for `key` in one shot.
    pub fn placement_of(&self, key: &str, nodes: &[Node]) -> Option<PlacementResult> {
        let replicas: Vec<NodeId> = self.replicas_of(key, nodes).iter().map(|n| n.id).collect();
        let primary = *replicas.first()?;
        Some(PlacementResult {
            ring_position: self.position(key),
            primary,
            replicas,
        })
    }

    /// Successor rule over a sorted entry list.
    fn successor(&self, key: &str, entries: &[RingEntry]) -> Option<NodeId> {
        if entries.is_empty() {
            return None;
        }
        let position = self.position(key);
        entries
            .iter()
            .find(|e| e.position >= position)
            .or_else(|| entries.first())
            .map(|e| e.node_id)
    }
}
