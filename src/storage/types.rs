use serde::{Deserialize, Serialize};
use std::fmt;

pub type TransactionId = u64;

/// Fixed replication factor: every key lives on three ring-adjacent nodes.
pub const REPLICATION_FACTOR: usize = 3;

/// Position of a copy relative to its key's home on the ring.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ReplicaRole {
    Primary,
    Secondary,
    Tertiary,
}

impl ReplicaRole {
    pub const ALL: [ReplicaRole; REPLICATION_FACTOR] = [
        ReplicaRole::Primary,
        ReplicaRole::Secondary,
        ReplicaRole::Tertiary,
    ];

    /// Role of the replica at `index` in a replica triple.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Client-visible operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Create => "CREATE",
            Operation::Read => "READ",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// A stored value tagged with the role this copy plays.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    pub value: String,
    pub timestamp: u64,
    pub role: ReplicaRole,
}

impl Entry {
    pub fn new(value: impl Into<String>, timestamp: u64, role: ReplicaRole) -> Self {
        Self {
            value: value.into(),
            timestamp,
            role,
        }
    }
}
