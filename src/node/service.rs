use super::env::NodeEnv;
use super::protocol::Message;
use crate::error::NodeError;
use crate::membership::service::MembershipService;
use crate::membership::types::{NodeId, NodeStatus};
use crate::storage::service::StoreService;
use crate::storage::types::{Operation, TransactionId};

/// One peer: membership and storage layers driven by a single tick.
///
/// A tick runs to completion before control returns to the driver, and
/// inbound messages are handled strictly one at a time in queue order.
pub struct Node {
    id: NodeId,
    membership: MembershipService,
    storage: StoreService,
    env: NodeEnv,
    failed: bool,
    /// Membership version the current ring was built from.
    ring_built_from: Option<u64>,
}

impl Node {
    pub fn new(id: NodeId, env: NodeEnv, seed: u64) -> Self {
        Self {
            id,
            membership: MembershipService::new(id, env.clone(), seed),
            storage: StoreService::new(id, env.clone()),
            env,
            failed: false,
            ring_built_from: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn membership(&self) -> &MembershipService {
        &self.membership
    }

    pub fn storage(&self) -> &StoreService {
        &self.storage
    }

    pub fn status(&self) -> NodeStatus {
        self.membership.status()
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn start(&mut self) -> Result<(), NodeError> {
        if self.failed {
            return Err(NodeError::Failed(self.id));
        }
        self.membership.start()
    }

    /// Stops the node dead: no more ticks, state left as it was.
    pub fn fail(&mut self) {
        tracing::info!("{} failed", self.id);
        self.failed = true;
    }

    pub fn shutdown(&mut self) {
        self.membership.shutdown();
        self.ring_built_from = None;
    }

    pub fn tick(&mut self) {
        if self.failed
            || matches!(
                self.status(),
                NodeStatus::Uninitialized | NodeStatus::ShutDown
            )
        {
            return;
        }

        self.storage.check_timeouts();

        for bytes in self.env.transport.receive(self.id) {
            match Message::decode(&bytes) {
                Ok(msg) => self.handle(msg),
                Err(e) => tracing::warn!("{} dropping undecodable message: {}", self.id, e),
            }
        }

        if !self.membership.is_in_group() {
            return;
        }

        self.membership.upkeep();

        let version = self.membership.version();
        if self.ring_built_from != Some(version) {
            self.ring_built_from = Some(version);
            if self.storage.update_ring(self.membership.members()) {
                self.storage.stabilize();
            }
        }

        self.membership.gossip();
    }

    fn handle(&mut self, msg: Message) {
        match msg {
            Message::JoinReq { from, heartbeat } => {
                self.membership.handle_join_request(from, heartbeat)
            }
            Message::JoinRep {
                from,
                heartbeat,
                members,
            } => self.membership.handle_join_reply(from, heartbeat, members),
            Message::Heartbeat {
                from,
                heartbeat,
                members,
            } => self.membership.handle_heartbeat(from, heartbeat, members),
            Message::Create(request) => self.storage.serve(Operation::Create, request),
            Message::Read(request) => self.storage.serve(Operation::Read, request),
            Message::Update(request) => self.storage.serve(Operation::Update, request),
            Message::Delete(request) => self.storage.serve(Operation::Delete, request),
            Message::Reply(reply) => self.storage.handle_reply(reply),
            Message::Repair(repair) => self.storage.handle_repair(repair),
        }
    }

    // ------------------------------------------------------------
    // Client surface
    // ------------------------------------------------------------

    pub fn create(&mut self, key: &str, value: &str) -> Result<TransactionId, NodeError> {
        self.ensure_running()?;
        Ok(self.storage.create(key, value))
    }

    pub fn read(&mut self, key: &str) -> Result<TransactionId, NodeError> {
        self.ensure_running()?;
        Ok(self.storage.read(key))
    }

    pub fn update(&mut self, key: &str, value: &str) -> Result<TransactionId, NodeError> {
        self.ensure_running()?;
        Ok(self.storage.update(key, value))
    }

    pub fn delete(&mut self, key: &str) -> Result<TransactionId, NodeError> {
        self.ensure_running()?;
        Ok(self.storage.delete(key))
    }

    fn ensure_running(&self) -> Result<(), NodeError> {
        if self.failed {
            return Err(NodeError::Failed(self.id));
        }
        match self.status() {
            NodeStatus::Uninitialized | NodeStatus::ShutDown => Err(NodeError::NotStarted(self.id)),
            NodeStatus::NotInGroup | NodeStatus::InGroup => Ok(()),
        }
    }
}
