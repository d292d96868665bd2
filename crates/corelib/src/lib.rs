//! Core library for ring-based key placement.
//!
//! This crate provides the pure, stateless heart of the cluster:
//! - The key hashing function and ring positions
//! - Node identity and the node record
//! - Primary and replica lookup over an active-node snapshot
//!
//! Everything here is deterministic given a node snapshot; membership
//! state, persistence, and the operation log live in the `registry` crate.

pub mod hash;
pub mod node;
pub mod placement;

pub use hash::{hash_key, ring_position, DEFAULT_RING_SIZE};
pub use node::{Node, NodeId};
pub use placement::{Placement, PlacementResult, RingEntry};
