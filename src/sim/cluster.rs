//! Round-based driver.
//!
//! Owns every node plus the shared clock, network and audit log. A round
//! ticks each live node once, in order, then advances the clock. No two
//! ticks ever interleave.

use super::audit::RecordingLog;
use super::clock::{Clock, SimClock};
use super::network::SimNetwork;
use crate::config::{Params, SimConfig};
use crate::error::NodeError;
use crate::membership::types::NodeId;
use crate::node::env::NodeEnv;
use crate::node::service::Node;
use crate::storage::types::{Entry, TransactionId};
use std::sync::Arc;

pub struct Cluster {
    clock: SimClock,
    network: Arc<SimNetwork>,
    audit: Arc<RecordingLog>,
    params: Params,
    seed: u64,
    nodes: Vec<Node>,
}

impl Cluster {
    pub fn new(params: Params, seed: u64) -> Self {
        Self::with_network(params, seed, 0.0, 0)
    }

    pub fn with_network(params: Params, seed: u64, drop_rate: f64, max_delay: u64) -> Self {
        let clock = SimClock::new();
        let network = SimNetwork::new(Arc::new(clock.clone()), seed)
            .with_loss(drop_rate)
            .with_delay(max_delay);

        Self {
            clock,
            network: Arc::new(network),
            audit: Arc::new(RecordingLog::new()),
            params,
            seed,
            nodes: Vec::new(),
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::with_network(
            config.params.clone(),
            config.seed,
            config.drop_rate,
            config.max_delay,
        )
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn audit(&self) -> &RecordingLog {
        &self.audit
    }

    pub fn network(&self) -> &SimNetwork {
        &self.network
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id() == id)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.id() == id)
    }

    pub fn live_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| !node.is_failed())
    }

    /// Adds a node addressed `<n>.0.0.0:0`, numbering from 1 so the first
    /// node added sits on the default introducer address.
    pub fn add_node(&mut self) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32 + 1, 0);
        self.add_node_with_id(id)
    }

    pub fn add_node_with_id(&mut self, id: NodeId) -> NodeId {
        let env = NodeEnv::new(
            self.network.clone(),
            Arc::new(self.clock.clone()),
            self.audit.clone(),
            self.params.clone(),
        );
        let seed = self.seed ^ ((u64::from(id.id) << 16) | u64::from(id.port));
        self.nodes.push(Node::new(id, env, seed));
        id
    }

    /// Boots a node. A node that cannot boot is failed on the spot.
    pub fn start(&mut self, id: NodeId) -> Result<(), NodeError> {
        let node = self.node_mut(id).ok_or(NodeError::UnknownNode(id))?;
        if let Err(e) = node.start() {
            tracing::error!("{} could not start: {}", id, e);
            node.fail();
            return Err(e);
        }
        Ok(())
    }

    pub fn fail(&mut self, id: NodeId) {
        if let Some(node) = self.node_mut(id) {
            node.fail();
        }
    }

    pub fn run_round(&mut self) {
        for node in self.nodes.iter_mut() {
            node.tick();
        }
        self.clock.advance();
    }

    pub fn run_rounds(&mut self, rounds: u64) {
        for _ in 0..rounds {
            self.run_round();
        }
    }

    /// Adds and starts `count` nodes, running `interval` rounds after each.
    pub fn boot(&mut self, count: usize, interval: u64) -> Result<Vec<NodeId>, NodeError> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let id = self.add_node();
            self.start(id)?;
            ids.push(id);
            self.run_rounds(interval);
        }
        Ok(ids)
    }

    // ------------------------------------------------------------
    // Client operations, injected at a chosen coordinator
    // ------------------------------------------------------------

    fn client(&mut self, at: NodeId) -> Result<&mut Node, NodeError> {
        self.node_mut(at).ok_or(NodeError::UnknownNode(at))
    }

    pub fn create(&mut self, at: NodeId, key: &str, value: &str) -> Result<TransactionId, NodeError> {
        self.client(at)?.create(key, value)
    }

    pub fn read(&mut self, at: NodeId, key: &str) -> Result<TransactionId, NodeError> {
        self.client(at)?.read(key)
    }

    pub fn update(&mut self, at: NodeId, key: &str, value: &str) -> Result<TransactionId, NodeError> {
        self.client(at)?.update(key, value)
    }

    pub fn delete(&mut self, at: NodeId, key: &str) -> Result<TransactionId, NodeError> {
        self.client(at)?.delete(key)
    }

    // ------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------

    /// Live nodes holding `key`, with their copy.
    pub fn holders(&self, key: &str) -> Vec<(NodeId, Entry)> {
        self.live_nodes()
            .filter_map(|node| {
                node.storage()
                    .store()
                    .read(key)
                    .map(|entry| (node.id(), entry.clone()))
            })
            .collect()
    }

    /// True once every live node lists every other live node.
    pub fn converged(&self) -> bool {
        let live: Vec<NodeId> = self.live_nodes().map(Node::id).collect();
        self.live_nodes().all(|node| {
            let table = node.membership().table();
            live.iter()
                .filter(|peer| **peer != node.id())
                .all(|peer| table.contains(peer))
        })
    }
}
