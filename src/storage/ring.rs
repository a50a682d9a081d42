//! Consistent-hashing ring.
//!
//! The ring is a sorted array read circularly; neighbours are found with
//! modular index arithmetic. Every node builds it independently from its own
//! membership view, so two nodes with the same view agree on every replica
//! triple.

use super::types::{REPLICATION_FACTOR, ReplicaRole};
use crate::membership::types::NodeId;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Size of the position space: positions are `hash mod RING_SIZE`.
pub const RING_SIZE: u64 = 1 << 32;

pub fn key_position(key: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish() % RING_SIZE
}

pub fn node_position(node: &NodeId) -> u64 {
    key_position(&node.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingNode {
    pub node: NodeId,
    pub position: u64,
}

/// The two predecessors whose primary data this node backs up, and the two
/// successors that back up this node's primary data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbors {
    pub have_replicas_of: [NodeId; 2],
    pub has_my_replicas: [NodeId; 2],
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ring {
    nodes: Vec<RingNode>,
}

impl Ring {
    /// Hashes every member onto the ring. Colliding positions are kept; ties
    /// are broken by address so every builder sorts identically.
    pub fn build(members: impl IntoIterator<Item = NodeId>) -> Self {
        Self::from_positions(
            members
                .into_iter()
                .map(|node| RingNode {
                    node,
                    position: node_position(&node),
                })
                .collect(),
        )
    }

    pub fn from_positions(mut nodes: Vec<RingNode>) -> Self {
        nodes.sort_by(|a, b| a.position.cmp(&b.position).then(a.node.cmp(&b.node)));
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[RingNode] {
        &self.nodes
    }

    pub fn index_of(&self, node: &NodeId) -> Option<usize> {
        self.nodes.iter().position(|entry| &entry.node == node)
    }

    fn at(&self, index: usize) -> NodeId {
        self.nodes[index % self.nodes.len()].node
    }

    pub fn neighbors(&self, node: &NodeId) -> Option<Neighbors> {
        let p = self.index_of(node)?;
        let n = self.nodes.len();
        // p + 2n keeps the predecessor arithmetic non-negative for n < 2.
        Some(Neighbors {
            have_replicas_of: [self.at(p + 2 * n - 2), self.at(p + 2 * n - 1)],
            has_my_replicas: [self.at(p + 1), self.at(p + 2)],
        })
    }

    /// Ordered replica triple `[Primary, Secondary, Tertiary]` for a key, or
    /// empty when the ring is too small to hold three copies.
    pub fn find_nodes(&self, key: &str) -> Vec<NodeId> {
        self.replicas_for(key_position(key))
    }

    pub fn replicas_for(&self, position: u64) -> Vec<NodeId> {
        let n = self.nodes.len();
        if n < REPLICATION_FACTOR {
            return Vec::new();
        }

        let first = self.nodes[0].position;
        let last = self.nodes[n - 1].position;
        let home = if position <= first || position > last {
            0
        } else {
            self.nodes.partition_point(|entry| entry.position < position)
        };

        (0..REPLICATION_FACTOR).map(|i| self.at(home + i)).collect()
    }

    /// Role `node` plays for `key`, if it is one of the key's replicas.
    pub fn role_of(&self, key: &str, node: &NodeId) -> Option<ReplicaRole> {
        self.find_nodes(key)
            .iter()
            .position(|replica| replica == node)
            .and_then(ReplicaRole::from_index)
    }
}
