use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::table::{MembershipTable, MergeOutcome};
use super::types::{MemberDigest, NodeId, NodeStatus};
use crate::error::NodeError;
use crate::node::env::NodeEnv;
use crate::node::protocol::Message;
use crate::sim::audit::AuditEvent;

/// Gossip membership and implicit failure detection for one node.
///
/// A peer is never declared dead by message: it simply stops advancing its
/// heartbeat, stops being gossiped after `tfail` ticks and is purged after
/// `tremove`. Every node reaches that conclusion from its own clock.
pub struct MembershipService {
    local: NodeId,
    status: NodeStatus,
    heartbeat: u64,
    table: MembershipTable,
    rng: StdRng,
    env: NodeEnv,
}

impl MembershipService {
    pub fn new(local: NodeId, env: NodeEnv, seed: u64) -> Self {
        Self {
            local,
            status: NodeStatus::Uninitialized,
            heartbeat: 0,
            table: MembershipTable::new(local),
            rng: StdRng::seed_from_u64(seed),
            env,
        }
    }

    pub fn local(&self) -> NodeId {
        self.local
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn is_in_group(&self) -> bool {
        self.status == NodeStatus::InGroup
    }

    pub fn heartbeat(&self) -> u64 {
        self.heartbeat
    }

    pub fn table(&self) -> &MembershipTable {
        &self.table
    }

    pub fn members(&self) -> Vec<NodeId> {
        self.table.members()
    }

    /// Changes whenever a member is added or removed.
    pub fn version(&self) -> u64 {
        self.table.version()
    }

    /// Initializes local state and introduces this node to the group.
    pub fn start(&mut self) -> Result<(), NodeError> {
        if matches!(self.status, NodeStatus::NotInGroup | NodeStatus::InGroup) {
            return Err(NodeError::AlreadyStarted(self.local));
        }

        self.heartbeat = 0;
        self.table.clear();
        self.status = NodeStatus::NotInGroup;

        let introducer = self.env.params.introducer;
        if introducer == self.local {
            tracing::info!("{} starting up group", self.local);
            self.status = NodeStatus::InGroup;
            return Ok(());
        }

        let msg = Message::JoinReq {
            from: self.local,
            heartbeat: self.heartbeat,
        };
        self.env.try_send(self.local, introducer, &msg)?;
        tracing::info!("{} trying to join via {}", self.local, introducer);

        Ok(())
    }

    pub fn shutdown(&mut self) {
        tracing::info!("{} leaving, dropping {} members", self.local, self.table.len());
        self.table.clear();
        self.heartbeat = 0;
        self.status = NodeStatus::ShutDown;
    }

    pub fn handle_join_request(&mut self, from: NodeId, heartbeat: u64) {
        tracing::debug!("{} received JOINREQ from {}", self.local, from);

        self.merge(MemberDigest {
            node: from,
            heartbeat,
        });

        let members = self.snapshot();
        let reply = Message::JoinRep {
            from: self.local,
            heartbeat: self.heartbeat,
            members,
        };
        self.env.send(self.local, from, &reply);
    }

    pub fn handle_join_reply(&mut self, from: NodeId, heartbeat: u64, members: Vec<MemberDigest>) {
        self.handle_heartbeat(from, heartbeat, members);

        if self.status == NodeStatus::NotInGroup {
            tracing::info!(
                "{} joined the group via {} ({} members known)",
                self.local,
                from,
                self.table.len()
            );
            self.status = NodeStatus::InGroup;
        }
    }

    pub fn handle_heartbeat(&mut self, from: NodeId, heartbeat: u64, members: Vec<MemberDigest>) {
        tracing::debug!(
            "{} received heartbeat {} from {} with {} members",
            self.local,
            heartbeat,
            from,
            members.len()
        );

        for member in members {
            self.merge(member);
        }
        self.merge(MemberDigest {
            node: from,
            heartbeat,
        });
    }

    fn merge(&mut self, digest: MemberDigest) {
        let now = self.env.now();
        if self.table.merge(digest, now) == MergeOutcome::Inserted {
            self.env.record(AuditEvent::NodeAdded {
                node: self.local,
                peer: digest.node,
            });
        }
    }

    /// Purges members that have been silent for longer than `tremove`.
    pub fn upkeep(&mut self) {
        let now = self.env.now();
        let removed = self.table.purge_expired(now, self.env.params.tremove);
        self.record_removals(removed);
    }

    fn snapshot(&mut self) -> Vec<MemberDigest> {
        let params = &self.env.params;
        let snapshot = self
            .table
            .snapshot(self.env.now(), params.tfail, params.tremove);
        self.record_removals(snapshot.removed);
        snapshot.digests
    }

    fn record_removals(&self, removed: Vec<NodeId>) {
        for peer in removed {
            tracing::warn!("{} removing silent member {}", self.local, peer);
            self.env.record(AuditEvent::NodeRemoved {
                node: self.local,
                peer,
            });
        }
    }

    /// Advances the local heartbeat and pushes the filtered table to
    /// `ceil(n/2) + 1` peers taken circularly from a random starting index.
    pub fn gossip(&mut self) {
        if !self.is_in_group() {
            return;
        }
        self.heartbeat += 1;

        if self.table.is_empty() {
            return;
        }

        let members = self.snapshot();
        let peers = self.table.members();
        if peers.is_empty() {
            return;
        }

        let n = peers.len();
        let start = self.rng.gen_range(0..n);
        let fanout = (n.div_ceil(2) + 1).min(n);

        let msg = Message::Heartbeat {
            from: self.local,
            heartbeat: self.heartbeat,
            members,
        };
        for i in 0..fanout {
            let target = peers[(start + i) % n];
            self.env.send(self.local, target, &msg);
        }
    }
}
