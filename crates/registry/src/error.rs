//! Error types for registry operations.

use corelib::NodeId;

use crate::store::StoreError;

/// Errors that can occur while mutating or reading cluster membership.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The referenced node id is not part of the cluster.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// The backing store failed; membership or log durability is at risk,
    /// so this is always surfaced to the caller.
    #[error(transparent)]
    Store(#[from] StoreError),
}
