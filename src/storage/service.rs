use super::coordinator::{Coordinator, Resolved, Verdict};
use super::memory::{LocalStore, Upsert};
use super::protocol::{Reply, Repair, Request};
use super::ring::{Neighbors, Ring};
use super::types::{Entry, Operation, ReplicaRole, TransactionId};
use crate::membership::types::NodeId;
use crate::node::env::NodeEnv;
use crate::node::protocol::Message;
use crate::sim::audit::{AuditEvent, Outcome};

/// Replicated key-value layer of one node.
///
/// Plays two parts: coordinator for the client operations issued on this
/// node, and replica for the requests other coordinators (or this one) send
/// it. Requests addressed to itself are served in-process.
pub struct StoreService {
    local: NodeId,
    store: LocalStore,
    ring: Ring,
    neighbors: Option<Neighbors>,
    coordinator: Coordinator,
    env: NodeEnv,
}

impl StoreService {
    pub fn new(local: NodeId, env: NodeEnv) -> Self {
        Self {
            local,
            store: LocalStore::new(),
            ring: Ring::default(),
            neighbors: None,
            coordinator: Coordinator::new(),
            env,
        }
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    pub fn neighbors(&self) -> Option<Neighbors> {
        self.neighbors
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    // ------------------------------------------------------------
    // Ring maintenance
    // ------------------------------------------------------------

    /// Rebuilds the ring from this node plus `members`. Returns `true` only
    /// when the result differs from the current ring.
    pub fn update_ring(&mut self, members: impl IntoIterator<Item = NodeId>) -> bool {
        let ring = Ring::build(std::iter::once(self.local).chain(members));
        if ring == self.ring {
            return false;
        }

        tracing::info!(
            "{} ring changed: {} -> {} nodes",
            self.local,
            self.ring.len(),
            ring.len()
        );
        self.neighbors = ring.neighbors(&self.local);
        self.ring = ring;
        true
    }

    /// Re-replicates every local key against the current ring.
    ///
    /// A key this node still replicates is relabelled with its new role and
    /// pushed to the other two replicas. A key this node no longer replicates
    /// is pushed to the whole triple and dropped locally.
    pub fn stabilize(&mut self) {
        if self.store.is_empty() {
            return;
        }
        let Some(neighbors) = self.neighbors else {
            return;
        };
        if self.ring.len() < ReplicaRole::ALL.len() {
            tracing::debug!(
                "{} skipping stabilization: ring of {} cannot hold three copies",
                self.local,
                self.ring.len()
            );
            return;
        }

        let now = self.env.now();
        let mut pushed = 0usize;
        let mut handed_off = 0usize;

        for key in self.store.keys() {
            let Some(value) = self.store.read(&key).map(|entry| entry.value.clone()) else {
                continue;
            };
            let replicas = self.ring.find_nodes(&key);
            let local_index = replicas.iter().position(|replica| *replica == self.local);

            let targets: Vec<(NodeId, ReplicaRole)> = match local_index {
                Some(index) => {
                    let role = ReplicaRole::ALL[index];
                    self.store.relabel(&key, role);
                    repair_targets(role, &neighbors).to_vec()
                }
                None => {
                    self.store.delete(&key);
                    handed_off += 1;
                    replicas.into_iter().zip(ReplicaRole::ALL).collect()
                }
            };

            for (target, role) in targets {
                let repair = Repair {
                    transaction_id: self.coordinator.next_transaction_id(),
                    from: self.local,
                    key: key.clone(),
                    entry: Entry::new(value.clone(), now, role),
                };
                self.env.send(self.local, target, &Message::Repair(repair));
                pushed += 1;
            }
        }

        tracing::info!(
            "{} stabilization pushed {} copies, handed off {} keys",
            self.local,
            pushed,
            handed_off
        );
    }

    pub fn handle_repair(&mut self, repair: Repair) {
        let outcome = self.store.upsert(&repair.key, repair.entry);
        if outcome != Upsert::Unchanged {
            tracing::debug!(
                "{} repair of {:?} from {}: {:?}",
                self.local,
                repair.key,
                repair.from,
                outcome
            );
        }
    }

    // ------------------------------------------------------------
    // Client entry points (coordinator side)
    // ------------------------------------------------------------

    pub fn create(&mut self, key: &str, value: &str) -> TransactionId {
        self.dispatch(Operation::Create, key, value)
    }

    pub fn read(&mut self, key: &str) -> TransactionId {
        self.dispatch(Operation::Read, key, "")
    }

    pub fn update(&mut self, key: &str, value: &str) -> TransactionId {
        self.dispatch(Operation::Update, key, value)
    }

    pub fn delete(&mut self, key: &str) -> TransactionId {
        self.dispatch(Operation::Delete, key, "")
    }

    fn dispatch(&mut self, op: Operation, key: &str, value: &str) -> TransactionId {
        let id = self.coordinator.next_transaction_id();
        let now = self.env.now();
        let replicas = self.ring.find_nodes(key);

        if replicas.is_empty() {
            tracing::warn!(
                "{} cannot {} {:?}: ring has only {} nodes",
                self.local,
                op,
                key,
                self.ring.len()
            );
            self.record_operation(true, id, op, Outcome::Failure, key, None);
            return id;
        }

        // Registered before any dispatch so the local reply finds it.
        self.coordinator.register(id, op, key, value, now);

        for (replica, role) in replicas.into_iter().zip(ReplicaRole::ALL) {
            let request = Request {
                transaction_id: id,
                from: self.local,
                key: key.to_string(),
                entry: Entry::new(value, now, role),
            };

            if replica == self.local {
                self.serve(op, request);
            } else {
                self.env
                    .send(self.local, replica, &Message::request(op, request));
            }
        }

        id
    }

    // ------------------------------------------------------------
    // Replica handlers (server side)
    // ------------------------------------------------------------

    pub fn serve(&mut self, op: Operation, request: Request) {
        match op {
            Operation::Create => self.create_key_value(&request),
            Operation::Read => self.read_key(&request),
            Operation::Update => self.update_key_value(&request),
            Operation::Delete => self.delete_key(&request),
        }
    }

    fn create_key_value(&mut self, request: &Request) {
        let success = self.store.create(&request.key, request.entry.clone());
        let value = Some(request.entry.value.clone());
        self.finish_request(Operation::Create, request, success, value);
    }

    fn read_key(&mut self, request: &Request) {
        let found = self
            .store
            .read(&request.key)
            .map(|entry| entry.value.clone());
        self.finish_request(Operation::Read, request, found.is_some(), found);
    }

    fn update_key_value(&mut self, request: &Request) {
        let success = self.store.update(&request.key, request.entry.clone());
        let value = Some(request.entry.value.clone());
        self.finish_request(Operation::Update, request, success, value);
    }

    fn delete_key(&mut self, request: &Request) {
        let success = self.store.delete(&request.key);
        self.finish_request(Operation::Delete, request, success, None);
    }

    /// Records the local outcome and answers the coordinator. Only READ
    /// replies carry the value back.
    fn finish_request(
        &mut self,
        op: Operation,
        request: &Request,
        success: bool,
        value: Option<String>,
    ) {
        let outcome = if success {
            Outcome::Success
        } else {
            Outcome::Failure
        };
        let reply_value = match op {
            Operation::Read => value.clone(),
            _ => None,
        };
        self.record_operation(
            false,
            request.transaction_id,
            op,
            outcome,
            &request.key,
            value,
        );

        let reply = Reply {
            transaction_id: request.transaction_id,
            from: self.local,
            success,
            value: reply_value,
        };
        if request.from == self.local {
            self.handle_reply(reply);
        } else {
            self.env
                .send(self.local, request.from, &Message::Reply(reply));
        }
    }

    // ------------------------------------------------------------
    // Quorum tracking (coordinator side)
    // ------------------------------------------------------------

    pub fn handle_reply(&mut self, reply: Reply) {
        tracing::debug!(
            "{} reply for txn {} from {}: success={}",
            self.local,
            reply.transaction_id,
            reply.from,
            reply.success
        );

        if let Some(resolved) =
            self.coordinator
                .record_reply(reply.transaction_id, reply.success, reply.value)
        {
            self.record_verdict(resolved);
        }
    }

    /// Fails every transaction that has waited longer than the operation
    /// timeout without a verdict.
    pub fn check_timeouts(&mut self) {
        let now = self.env.now();
        for resolved in self.coordinator.sweep(now, self.env.params.op_timeout) {
            tracing::warn!(
                "{} {} {:?} timed out (txn {}, {} ok / {} failed replies)",
                self.local,
                resolved.transaction.op,
                resolved.transaction.key,
                resolved.id,
                resolved.transaction.successes,
                resolved.transaction.failures
            );
            self.record_verdict(resolved);
        }
    }

    fn record_verdict(&self, resolved: Resolved) {
        let Resolved {
            id,
            transaction,
            verdict,
        } = resolved;

        let (outcome, value) = match verdict {
            Verdict::Success { value } => {
                let value = match transaction.op {
                    Operation::Read => value,
                    Operation::Create | Operation::Update => Some(transaction.value.clone()),
                    Operation::Delete => None,
                };
                (Outcome::Success, value)
            }
            Verdict::Failure => (Outcome::Failure, None),
        };
        self.record_operation(true, id, transaction.op, outcome, &transaction.key, value);
    }

    fn record_operation(
        &self,
        coordinator: bool,
        transaction_id: TransactionId,
        op: Operation,
        outcome: Outcome,
        key: &str,
        value: Option<String>,
    ) {
        self.env.record(AuditEvent::Operation {
            node: self.local,
            coordinator,
            transaction_id,
            op,
            outcome,
            key: key.to_string(),
            value,
        });
    }
}

/// Where a copy held in `role` pushes the other two copies, and with which
/// labels.
pub fn repair_targets(role: ReplicaRole, neighbors: &Neighbors) -> [(NodeId, ReplicaRole); 2] {
    let Neighbors {
        have_replicas_of: [pred2, pred1],
        has_my_replicas: [succ1, succ2],
    } = *neighbors;

    match role {
        ReplicaRole::Primary => [(succ1, ReplicaRole::Secondary), (succ2, ReplicaRole::Tertiary)],
        ReplicaRole::Secondary => [(pred1, ReplicaRole::Primary), (succ1, ReplicaRole::Tertiary)],
        ReplicaRole::Tertiary => [(pred2, ReplicaRole::Primary), (pred1, ReplicaRole::Secondary)],
    }
}
