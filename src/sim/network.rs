//! Simulated network
//!
//! Address-addressed, fire-and-forget delivery with configurable loss and
//! delay. Delays are drawn per message, so two messages to the same node can
//! arrive out of order. Each node's inbox is drained once per tick.

use super::clock::Clock;
use crate::membership::types::NodeId;
use dashmap::{DashMap, DashSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};

pub trait Transport: Send + Sync {
    /// Queues `payload` for `to`. May silently drop it.
    fn send(&self, from: NodeId, to: NodeId, payload: Vec<u8>);

    /// Drains every message that has arrived for `addr`.
    fn receive(&self, addr: NodeId) -> Vec<Vec<u8>>;
}

#[derive(Debug)]
struct Packet {
    from: NodeId,
    payload: Vec<u8>,
    deliver_at: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetStats {
    pub sent: u64,
    pub received: u64,
    pub dropped: u64,
}

pub struct SimNetwork {
    clock: Arc<dyn Clock>,
    inboxes: DashMap<NodeId, Vec<Packet>>,
    isolated: DashSet<NodeId>,
    stats: DashMap<NodeId, NetStats>,
    rng: Mutex<StdRng>,
    drop_rate: f64,
    max_delay: u64,
}

impl SimNetwork {
    pub fn new(clock: Arc<dyn Clock>, seed: u64) -> Self {
        Self {
            clock,
            inboxes: DashMap::new(),
            isolated: DashSet::new(),
            stats: DashMap::new(),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            drop_rate: 0.0,
            max_delay: 0,
        }
    }

    pub fn with_loss(mut self, drop_rate: f64) -> Self {
        self.drop_rate = drop_rate;
        self
    }

    pub fn with_delay(mut self, max_delay: u64) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Drops all traffic to and from `node` until healed.
    pub fn isolate(&self, node: NodeId) {
        self.isolated.insert(node);
        tracing::info!("Network isolated {}", node);
    }

    pub fn heal(&self, node: NodeId) {
        self.isolated.remove(&node);
        tracing::info!("Network healed {}", node);
    }

    pub fn pending_count(&self, node: NodeId) -> usize {
        self.inboxes.get(&node).map(|q| q.len()).unwrap_or(0)
    }

    pub fn stats(&self, node: NodeId) -> NetStats {
        self.stats.get(&node).map(|s| *s).unwrap_or_default()
    }

    pub fn total_stats(&self) -> NetStats {
        self.stats.iter().fold(NetStats::default(), |acc, s| NetStats {
            sent: acc.sent + s.sent,
            received: acc.received + s.received,
            dropped: acc.dropped + s.dropped,
        })
    }

    /// Decides the fate of one message: `None` drops it, otherwise the extra
    /// delay in ticks.
    fn roll(&self) -> Option<u64> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        if self.drop_rate > 0.0 && rng.gen_bool(self.drop_rate) {
            return None;
        }
        if self.max_delay == 0 {
            Some(0)
        } else {
            Some(rng.gen_range(0..=self.max_delay))
        }
    }
}

impl Transport for SimNetwork {
    fn send(&self, from: NodeId, to: NodeId, payload: Vec<u8>) {
        self.stats.entry(from).or_default().sent += 1;

        if self.isolated.contains(&from) || self.isolated.contains(&to) {
            tracing::debug!("Message {} -> {} dropped: isolated", from, to);
            self.stats.entry(from).or_default().dropped += 1;
            return;
        }

        let Some(delay) = self.roll() else {
            tracing::debug!("Message {} -> {} dropped: packet loss", from, to);
            self.stats.entry(from).or_default().dropped += 1;
            return;
        };

        let packet = Packet {
            from,
            payload,
            deliver_at: self.clock.now() + delay,
        };
        self.inboxes.entry(to).or_default().push(packet);
    }

    fn receive(&self, addr: NodeId) -> Vec<Vec<u8>> {
        let now = self.clock.now();
        let Some(mut inbox) = self.inboxes.get_mut(&addr) else {
            return Vec::new();
        };

        let (ready, waiting): (Vec<Packet>, Vec<Packet>) = std::mem::take(&mut *inbox)
            .into_iter()
            .partition(|packet| packet.deliver_at <= now);
        *inbox = waiting;
        drop(inbox);

        if !ready.is_empty() {
            self.stats.entry(addr).or_default().received += ready.len() as u64;
        }

        ready
            .into_iter()
            .map(|packet| {
                tracing::trace!("{} <- {} ({} bytes)", addr, packet.from, packet.payload.len());
                packet.payload
            })
            .collect()
    }
}
