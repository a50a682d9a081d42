//! Membership Module Tests
//!
//! Validates the gossip membership table and the join/gossip service.
//!
//! ## Test Scopes
//! - **Addresses**: Round-trips between the 6-byte form, the printed form and `NodeId`.
//! - **Table**: Monotonic merge, liveness classification and filtered snapshots.
//! - **Service**: Join handshake, heartbeat advance and gossip fanout.

#[cfg(test)]
mod tests {
    use crate::config::Params;
    use crate::error::NodeError;
    use crate::membership::service::MembershipService;
    use crate::membership::table::{MembershipTable, MergeOutcome};
    use crate::membership::types::{Liveness, MemberDigest, MemberEntry, NodeId, NodeStatus};
    use crate::node::env::NodeEnv;
    use crate::node::protocol::Message;
    use crate::sim::audit::{AuditEvent, RecordingLog};
    use crate::sim::clock::SimClock;
    use crate::sim::network::{SimNetwork, Transport};
    use std::sync::Arc;

    fn node(id: u32) -> NodeId {
        NodeId::new(id, 0)
    }

    fn digest(id: u32, heartbeat: u64) -> MemberDigest {
        MemberDigest {
            node: node(id),
            heartbeat,
        }
    }

    struct Harness {
        clock: SimClock,
        network: Arc<SimNetwork>,
        audit: Arc<RecordingLog>,
    }

    impl Harness {
        fn new() -> Self {
            let clock = SimClock::new();
            let network = Arc::new(SimNetwork::new(Arc::new(clock.clone()), 3));
            Self {
                clock,
                network,
                audit: Arc::new(RecordingLog::new()),
            }
        }

        fn service(&self, id: u32) -> MembershipService {
            let env = NodeEnv::new(
                self.network.clone(),
                Arc::new(self.clock.clone()),
                self.audit.clone(),
                Params::default(),
            );
            MembershipService::new(node(id), env, u64::from(id))
        }

        fn inbox(&self, id: u32) -> Vec<Message> {
            self.network
                .receive(node(id))
                .iter()
                .map(|bytes| Message::decode(bytes).unwrap())
                .collect()
        }
    }

    // ============================================================
    // NODE ID TESTS
    // ============================================================

    #[test]
    fn test_node_id_prints_as_dotted_address() {
        let id = NodeId::from_bytes([1, 0, 0, 0, 0x39, 0x30]);

        assert_eq!(id, NodeId::new(1, 12345));
        assert_eq!(id.to_string(), "1.0.0.0:12345");
        assert_eq!(id.to_bytes(), [1, 0, 0, 0, 0x39, 0x30]);
    }

    #[test]
    fn test_node_id_parses_printed_form() {
        let id: NodeId = "7.0.0.0:80".parse().unwrap();

        assert_eq!(id, NodeId::new(7, 80));
        assert!("7.0.0:80".parse::<NodeId>().is_err());
        assert!("7.0.0.0".parse::<NodeId>().is_err());
        assert!("7.0.0.0.1:80".parse::<NodeId>().is_err());
    }

    // ============================================================
    // TABLE MERGE TESTS
    // ============================================================

    #[test]
    fn test_merge_inserts_new_member() {
        let mut table = MembershipTable::new(node(1));

        assert_eq!(table.merge(digest(2, 4), 10), MergeOutcome::Inserted);

        let entry = table.get(&node(2)).unwrap();
        assert_eq!(entry.heartbeat, 4);
        assert_eq!(entry.last_update, 10);
        assert_eq!(table.version(), 1);
    }

    #[test]
    fn test_merge_is_monotonic() {
        let mut table = MembershipTable::new(node(1));
        table.merge(digest(2, 5), 10);

        // Equal and older heartbeats leave the entry untouched
        assert_eq!(table.merge(digest(2, 5), 12), MergeOutcome::Ignored);
        assert_eq!(table.merge(digest(2, 3), 13), MergeOutcome::Ignored);
        assert_eq!(table.get(&node(2)).unwrap().last_update, 10);

        assert_eq!(table.merge(digest(2, 6), 14), MergeOutcome::Refreshed);
        let entry = table.get(&node(2)).unwrap();
        assert_eq!(entry.heartbeat, 6);
        assert_eq!(entry.last_update, 14);
    }

    #[test]
    fn test_merge_never_inserts_owner() {
        let mut table = MembershipTable::new(node(1));

        assert_eq!(table.merge(digest(1, 99), 0), MergeOutcome::Ignored);
        assert!(table.is_empty());
    }

    #[test]
    fn test_version_tracks_membership_changes_only() {
        let mut table = MembershipTable::new(node(1));
        table.merge(digest(2, 1), 0);
        table.merge(digest(3, 1), 0);
        assert_eq!(table.version(), 2);

        table.merge(digest(2, 2), 1);
        assert_eq!(table.version(), 2, "refresh must not bump the version");

        table.purge_expired(100, 20);
        assert_eq!(table.version(), 3);
        assert!(table.is_empty());
    }

    // ============================================================
    // LIVENESS TESTS
    // ============================================================

    #[test]
    fn test_classify_boundaries() {
        let entry = MemberEntry {
            node: node(2),
            heartbeat: 1,
            last_update: 100,
        };

        assert_eq!(MembershipTable::classify(&entry, 105, 5, 20), Liveness::Alive);
        assert_eq!(MembershipTable::classify(&entry, 106, 5, 20), Liveness::Suspected);
        assert_eq!(MembershipTable::classify(&entry, 120, 5, 20), Liveness::Suspected);
        assert_eq!(MembershipTable::classify(&entry, 121, 5, 20), Liveness::Expired);
    }

    #[test]
    fn test_snapshot_withholds_suspected_and_purges_expired() {
        // ARRANGE: one fresh, one suspected, one expired member at tick 30
        let mut table = MembershipTable::new(node(1));
        table.merge(digest(2, 1), 30);
        table.merge(digest(3, 1), 22);
        table.merge(digest(4, 1), 5);

        // ACT
        let snapshot = table.snapshot(30, 5, 20);

        // ASSERT
        assert_eq!(snapshot.digests, vec![digest(2, 1)]);
        assert_eq!(snapshot.removed, vec![node(4)]);
        assert!(table.contains(&node(3)), "suspected members stay local");
        assert!(!table.contains(&node(4)));
        assert_eq!(table.len(), 2);
    }

    // ============================================================
    // SERVICE TESTS
    // ============================================================

    #[test]
    fn test_introducer_starts_in_group() {
        let harness = Harness::new();
        let mut introducer = harness.service(1);

        introducer.start().unwrap();

        assert_eq!(introducer.status(), NodeStatus::InGroup);
        assert!(harness.inbox(1).is_empty());
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let harness = Harness::new();
        let mut service = harness.service(2);
        service.start().unwrap();

        assert!(matches!(service.start(), Err(NodeError::AlreadyStarted(_))));
    }

    #[test]
    fn test_join_handshake() {
        // ARRANGE
        let harness = Harness::new();
        let mut introducer = harness.service(1);
        let mut joiner = harness.service(2);
        introducer.start().unwrap();

        // ACT: joiner asks, introducer answers
        joiner.start().unwrap();
        assert_eq!(joiner.status(), NodeStatus::NotInGroup);

        for msg in harness.inbox(1) {
            match msg {
                Message::JoinReq { from, heartbeat } => {
                    introducer.handle_join_request(from, heartbeat)
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        for msg in harness.inbox(2) {
            match msg {
                Message::JoinRep {
                    from,
                    heartbeat,
                    members,
                } => joiner.handle_join_reply(from, heartbeat, members),
                other => panic!("unexpected {:?}", other),
            }
        }

        // ASSERT
        assert_eq!(joiner.status(), NodeStatus::InGroup);
        assert!(introducer.table().contains(&node(2)));
        assert!(joiner.table().contains(&node(1)));
        assert!(harness.audit.events().contains(&AuditEvent::NodeAdded {
            node: node(1),
            peer: node(2),
        }));
    }

    #[test]
    fn test_join_reply_carries_known_members() {
        let harness = Harness::new();
        let mut introducer = harness.service(1);
        introducer.start().unwrap();
        introducer.handle_heartbeat(node(3), 1, vec![digest(4, 2)]);

        introducer.handle_join_request(node(2), 0);

        let reply = harness.inbox(2).pop().unwrap();
        let Message::JoinRep { members, .. } = reply else {
            panic!("expected JOINREP, got {:?}", reply);
        };
        let mut nodes: Vec<NodeId> = members.iter().map(|m| m.node).collect();
        nodes.sort();
        assert_eq!(nodes, vec![node(2), node(3), node(4)]);
    }

    #[test]
    fn test_gossip_advances_heartbeat_and_fans_out() {
        // ARRANGE: introducer knowing four peers
        let harness = Harness::new();
        let mut service = harness.service(1);
        service.start().unwrap();
        service.handle_heartbeat(node(2), 1, vec![digest(3, 1), digest(4, 1), digest(5, 1)]);
        let sent_before = harness.network.total_stats().sent;

        // ACT
        service.gossip();

        // ASSERT: ceil(4/2) + 1 = 3 heartbeats
        assert_eq!(service.heartbeat(), 1);
        assert_eq!(harness.network.total_stats().sent - sent_before, 3);

        let received: usize = (2..=5).map(|id| harness.inbox(id).len()).sum();
        assert_eq!(received, 3);
    }

    #[test]
    fn test_gossip_reaches_every_peer_of_a_small_table() {
        let harness = Harness::new();
        let mut service = harness.service(1);
        service.start().unwrap();
        service.handle_heartbeat(node(2), 1, vec![]);

        service.gossip();

        let msgs = harness.inbox(2);
        assert_eq!(msgs.len(), 1);
        assert!(matches!(msgs[0], Message::Heartbeat { heartbeat: 1, .. }));
    }

    #[test]
    fn test_upkeep_purges_and_audits_silent_member() {
        let harness = Harness::new();
        let mut service = harness.service(1);
        service.start().unwrap();
        service.handle_heartbeat(node(2), 1, vec![]);

        harness.clock.advance_by(21);
        service.upkeep();

        assert!(service.members().is_empty());
        assert_eq!(harness.audit.removals_of(node(2)), 1);
    }

    #[test]
    fn test_shutdown_clears_view() {
        let harness = Harness::new();
        let mut service = harness.service(1);
        service.start().unwrap();
        service.handle_heartbeat(node(2), 1, vec![]);

        service.shutdown();

        assert_eq!(service.status(), NodeStatus::ShutDown);
        assert!(service.table().is_empty());
    }
}
