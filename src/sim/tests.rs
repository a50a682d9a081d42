//! Cluster Scenario Tests
//!
//! Drives whole clusters through the round-based driver and checks what every
//! node ends up believing and storing.
//!
//! ## Test Scopes
//! - **Membership**: Join propagation, convergence and eviction of silent nodes.
//! - **Quorum**: End-to-end CRUD verdicts, immediate and timed-out failures.
//! - **Stabilization**: Replica placement and labels after nodes join or fail.

#[cfg(test)]
mod tests {
    use crate::config::Params;
    use crate::error::NodeError;
    use crate::membership::types::{NodeId, NodeStatus};
    use crate::sim::audit::{AuditEvent, Outcome};
    use crate::sim::cluster::Cluster;
    use crate::storage::types::{Operation, ReplicaRole};

    fn node(id: u32) -> NodeId {
        NodeId::new(id, 0)
    }

    fn converged_cluster(nodes: usize) -> Cluster {
        let mut cluster = Cluster::new(Params::default(), 11);
        cluster.boot(nodes, 1).unwrap();
        cluster.run_rounds(10);
        assert!(cluster.converged(), "cluster of {} did not converge", nodes);
        cluster
    }

    fn replicas(cluster: &Cluster, key: &str) -> Vec<NodeId> {
        cluster
            .live_nodes()
            .next()
            .unwrap()
            .storage()
            .ring()
            .find_nodes(key)
    }

    /// Asserts the live holders of `key` are exactly its replica triple, each
    /// copy labelled with its place in the triple.
    fn assert_placed(cluster: &Cluster, key: &str, value: &str) {
        let expected = replicas(cluster, key);
        assert_eq!(expected.len(), 3);

        let holders = cluster.holders(key);
        assert_eq!(holders.len(), 3, "{} held by {:?}", key, holders);

        for (index, replica) in expected.iter().enumerate() {
            let (_, entry) = holders
                .iter()
                .find(|(holder, _)| holder == replica)
                .unwrap_or_else(|| panic!("{} missing on replica {}", key, replica));
            assert_eq!(entry.value, value);
            assert_eq!(Some(entry.role), ReplicaRole::from_index(index));
        }
    }

    fn server_records(cluster: &Cluster, op: Operation, key: &str) -> usize {
        cluster
            .audit()
            .events()
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    AuditEvent::Operation { coordinator: false, op: o, key: k, .. }
                        if *o == op && k == key
                )
            })
            .count()
    }

    // ============================================================
    // MEMBERSHIP TESTS
    // ============================================================

    #[test]
    fn test_nodes_join_through_introducer() {
        let mut cluster = Cluster::new(Params::default(), 1);
        let ids = cluster.boot(3, 1).unwrap();

        assert_eq!(ids, vec![node(1), node(2), node(3)]);
        for id in &ids {
            assert_eq!(cluster.node(*id).unwrap().status(), NodeStatus::InGroup);
        }
        assert!(cluster.node(node(1)).unwrap().membership().table().contains(&node(3)));
    }

    #[test]
    fn test_views_and_rings_converge() {
        let cluster = converged_cluster(6);

        let first = cluster.node(node(1)).unwrap().storage().ring().clone();
        assert_eq!(first.len(), 6);
        for n in cluster.nodes() {
            assert_eq!(n.membership().table().len(), 5);
            assert_eq!(n.storage().ring(), &first);
        }
    }

    #[test]
    fn test_converges_under_message_delay() {
        let mut cluster = Cluster::with_network(Params::default(), 4, 0.0, 2);
        cluster.boot(5, 2).unwrap();
        cluster.run_rounds(20);

        assert!(cluster.converged());
    }

    #[test]
    fn test_failed_node_is_evicted_everywhere() {
        // ARRANGE
        let mut cluster = converged_cluster(5);

        // ACT
        cluster.fail(node(3));
        cluster.run_rounds(Params::default().tremove + 5);

        // ASSERT
        for n in cluster.live_nodes() {
            assert!(!n.membership().table().contains(&node(3)));
            assert_eq!(n.storage().ring().len(), 4);
        }
        assert_eq!(cluster.audit().removals_of(node(3)), 4);
        assert!(cluster.converged());
    }

    #[test]
    fn test_silent_node_is_kept_until_tremove() {
        let mut cluster = converged_cluster(4);

        cluster.fail(node(4));
        cluster.run_rounds(Params::default().tfail + 2);

        for n in cluster.live_nodes() {
            assert!(n.membership().table().contains(&node(4)));
        }
        assert_eq!(cluster.audit().removals_of(node(4)), 0);
    }

    #[test]
    fn test_start_twice_fails_node() {
        let mut cluster = Cluster::new(Params::default(), 1);
        let id = cluster.add_node();
        cluster.start(id).unwrap();

        assert!(matches!(cluster.start(id), Err(NodeError::AlreadyStarted(_))));
        assert!(cluster.node(id).unwrap().is_failed());
    }

    #[test]
    fn test_unknown_coordinator_is_rejected() {
        let mut cluster = converged_cluster(3);

        assert!(matches!(
            cluster.create(node(99), "k", "v"),
            Err(NodeError::UnknownNode(_))
        ));
    }

    // ============================================================
    // QUORUM TESTS
    // ============================================================

    #[test]
    fn test_create_then_read_by_quorum() {
        // ARRANGE
        let mut cluster = converged_cluster(5);

        // ACT
        let created = cluster.create(node(2), "apple", "red").unwrap();
        cluster.run_rounds(3);
        let read = cluster.read(node(4), "apple").unwrap();
        cluster.run_rounds(3);

        // ASSERT
        assert_eq!(
            cluster.audit().verdicts(node(2), created),
            vec![(Operation::Create, Outcome::Success, Some("red".to_string()))]
        );
        assert_eq!(
            cluster.audit().verdicts(node(4), read),
            vec![(Operation::Read, Outcome::Success, Some("red".to_string()))]
        );
        assert_placed(&cluster, "apple", "red");
        assert_eq!(server_records(&cluster, Operation::Create, "apple"), 3);
    }

    #[test]
    fn test_late_reply_does_not_reopen_verdict() {
        let mut cluster = converged_cluster(5);

        let txn = cluster.create(node(1), "k", "v").unwrap();
        cluster.run_rounds(15);

        assert_eq!(cluster.audit().verdicts(node(1), txn).len(), 1);
        let coordinator = cluster.node(node(1)).unwrap().storage().coordinator();
        assert_eq!(coordinator.pending_count(), 0);
    }

    #[test]
    fn test_update_then_delete() {
        let mut cluster = converged_cluster(5);
        cluster.create(node(1), "k", "v1").unwrap();
        cluster.run_rounds(3);

        let updated = cluster.update(node(3), "k", "v2").unwrap();
        cluster.run_rounds(3);
        assert_eq!(
            cluster.audit().verdicts(node(3), updated),
            vec![(Operation::Update, Outcome::Success, Some("v2".to_string()))]
        );
        assert_placed(&cluster, "k", "v2");

        let deleted = cluster.delete(node(5), "k").unwrap();
        cluster.run_rounds(3);
        assert_eq!(
            cluster.audit().verdicts(node(5), deleted),
            vec![(Operation::Delete, Outcome::Success, None)]
        );
        assert!(cluster.holders("k").is_empty());
    }

    #[test]
    fn test_operations_on_missing_or_existing_keys_fail() {
        let mut cluster = converged_cluster(4);
        cluster.create(node(1), "k", "v").unwrap();
        cluster.run_rounds(3);

        let duplicate = cluster.create(node(2), "k", "other").unwrap();
        let missing_read = cluster.read(node(3), "nope").unwrap();
        let missing_update = cluster.update(node(4), "nope", "v").unwrap();
        let missing_delete = cluster.delete(node(1), "nope").unwrap();
        cluster.run_rounds(3);

        let audit = cluster.audit();
        assert_eq!(
            audit.verdicts(node(2), duplicate),
            vec![(Operation::Create, Outcome::Failure, None)]
        );
        assert_eq!(
            audit.verdicts(node(3), missing_read),
            vec![(Operation::Read, Outcome::Failure, None)]
        );
        assert_eq!(
            audit.verdicts(node(4), missing_update),
            vec![(Operation::Update, Outcome::Failure, None)]
        );
        assert_eq!(
            audit.verdicts(node(1), missing_delete),
            vec![(Operation::Delete, Outcome::Failure, None)]
        );
        assert_placed(&cluster, "k", "v");
    }

    #[test]
    fn test_small_ring_fails_immediately() {
        let mut cluster = Cluster::new(Params::default(), 2);
        cluster.boot(2, 3).unwrap();

        let txn = cluster.create(node(1), "k", "v").unwrap();

        assert_eq!(
            cluster.audit().verdicts(node(1), txn),
            vec![(Operation::Create, Outcome::Failure, None)]
        );
        assert_eq!(server_records(&cluster, Operation::Create, "k"), 0);
    }

    #[test]
    fn test_operation_times_out_without_quorum() {
        // ARRANGE: cut off two replicas other than the coordinator
        let mut cluster = converged_cluster(5);
        let coordinator = node(1);
        let cut: Vec<NodeId> = replicas(&cluster, "k")
            .into_iter()
            .filter(|replica| *replica != coordinator)
            .take(2)
            .collect();
        for replica in &cut {
            cluster.network().isolate(*replica);
        }

        // ACT
        let txn = cluster.create(coordinator, "k", "v").unwrap();
        cluster.run_rounds(5);
        let before_timeout = cluster.audit().verdicts(coordinator, txn);
        cluster.run_rounds(8);

        // ASSERT
        assert!(before_timeout.is_empty());
        assert_eq!(
            cluster.audit().verdicts(coordinator, txn),
            vec![(Operation::Create, Outcome::Failure, None)]
        );
    }

    // ============================================================
    // STABILIZATION TESTS
    // ============================================================

    fn seed_keys(cluster: &mut Cluster, count: usize) -> Vec<(String, String)> {
        let pairs: Vec<(String, String)> = (0..count)
            .map(|k| (format!("key-{}", k), format!("value-{}", k)))
            .collect();
        for (key, value) in &pairs {
            cluster.create(node(1), key, value).unwrap();
        }
        cluster.run_rounds(3);
        assert_eq!(
            cluster.audit().verdict_count(Operation::Create, Outcome::Success),
            count
        );
        pairs
    }

    #[test]
    fn test_join_restores_three_labelled_copies() {
        // ARRANGE
        let mut cluster = converged_cluster(4);
        let pairs = seed_keys(&mut cluster, 15);

        // ACT
        let newcomer = cluster.add_node();
        cluster.start(newcomer).unwrap();
        cluster.run_rounds(15);

        // ASSERT
        assert!(cluster.converged());
        for n in cluster.nodes() {
            assert_eq!(n.storage().ring().len(), 5);
        }
        for (key, value) in &pairs {
            assert_placed(&cluster, key, value);
        }
    }

    #[test]
    fn test_failure_restores_three_labelled_copies() {
        // ARRANGE
        let mut cluster = converged_cluster(5);
        let pairs = seed_keys(&mut cluster, 15);

        // ACT
        cluster.fail(node(3));
        cluster.run_rounds(Params::default().tremove + 10);

        // ASSERT
        for n in cluster.live_nodes() {
            assert_eq!(n.storage().ring().len(), 4);
        }
        for (key, value) in &pairs {
            assert_placed(&cluster, key, value);
        }
    }

    #[test]
    fn test_reads_survive_one_failure() {
        let mut cluster = converged_cluster(5);
        cluster.create(node(1), "k", "v").unwrap();
        cluster.run_rounds(3);

        let victim = replicas(&cluster, "k")
            .into_iter()
            .find(|replica| *replica != node(2))
            .unwrap();
        cluster.fail(victim);

        let txn = cluster.read(node(2), "k").unwrap();
        cluster.run_rounds(3);

        assert_eq!(
            cluster.audit().verdicts(node(2), txn),
            vec![(Operation::Read, Outcome::Success, Some("v".to_string()))]
        );
    }
}
