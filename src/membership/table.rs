//! Per-node membership table.
//!
//! Entries are kept in insertion order so gossip can pick a random starting
//! index and walk the table circularly. The table never contains its owner.

use super::types::{Liveness, MemberDigest, MemberEntry, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First time this node was heard of.
    Inserted,
    /// Heartbeat advanced; freshness reset.
    Refreshed,
    /// Stale or duplicate heartbeat, or the owner itself.
    Ignored,
}

#[derive(Debug)]
pub struct MembershipTable {
    owner: NodeId,
    entries: Vec<MemberEntry>,
    /// Bumped on every insert or removal. Heartbeat refreshes do not count:
    /// they never change the set of members.
    version: u64,
}

impl MembershipTable {
    pub fn new(owner: NodeId) -> Self {
        Self {
            owner,
            entries: Vec::new(),
            version: 0,
        }
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn entries(&self) -> &[MemberEntry] {
        &self.entries
    }

    pub fn get(&self, node: &NodeId) -> Option<&MemberEntry> {
        self.entries.iter().find(|entry| &entry.node == node)
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.get(node).is_some()
    }

    pub fn members(&self) -> Vec<NodeId> {
        self.entries.iter().map(|entry| entry.node).collect()
    }

    /// Applies one gossiped heartbeat. Acceptance is monotonic: a known entry
    /// only moves forward on a strictly greater heartbeat.
    pub fn merge(&mut self, digest: MemberDigest, now: u64) -> MergeOutcome {
        if digest.node == self.owner {
            return MergeOutcome::Ignored;
        }

        match self.entries.iter_mut().find(|entry| entry.node == digest.node) {
            Some(existing) => {
                if digest.heartbeat > existing.heartbeat {
                    existing.heartbeat = digest.heartbeat;
                    existing.last_update = now;
                    MergeOutcome::Refreshed
                } else {
                    MergeOutcome::Ignored
                }
            }
            None => {
                self.entries.push(MemberEntry {
                    node: digest.node,
                    heartbeat: digest.heartbeat,
                    last_update: now,
                });
                self.version += 1;
                MergeOutcome::Inserted
            }
        }
    }

    pub fn classify(entry: &MemberEntry, now: u64, tfail: u64, tremove: u64) -> Liveness {
        let age = entry.age(now);
        if age > tremove {
            Liveness::Expired
        } else if age > tfail {
            Liveness::Suspected
        } else {
            Liveness::Alive
        }
    }

    /// Drops every entry older than `tremove` and returns who was dropped.
    pub fn purge_expired(&mut self, now: u64, tremove: u64) -> Vec<NodeId> {
        let mut removed = Vec::new();
        self.entries.retain(|entry| {
            if entry.age(now) > tremove {
                removed.push(entry.node);
                false
            } else {
                true
            }
        });
        if !removed.is_empty() {
            self.version += 1;
        }
        removed
    }

    /// Filtered export for gossip: expired entries are purged, suspected
    /// entries are withheld, the rest are exported.
    pub fn snapshot(&mut self, now: u64, tfail: u64, tremove: u64) -> Snapshot {
        let removed = self.purge_expired(now, tremove);
        let digests = self
            .entries
            .iter()
            .filter(|entry| Self::classify(entry, now, tfail, tremove) == Liveness::Alive)
            .map(MemberEntry::digest)
            .collect();

        Snapshot { digests, removed }
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.version += 1;
        }
        self.entries.clear();
    }
}

#[derive(Debug, Default)]
pub struct Snapshot {
    pub digests: Vec<MemberDigest>,
    pub removed: Vec<NodeId>,
}
