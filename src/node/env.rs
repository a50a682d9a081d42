use super::protocol::Message;
use crate::config::Params;
use crate::membership::types::NodeId;
use crate::sim::audit::{AuditEvent, AuditLog};
use crate::sim::clock::Clock;
use crate::sim::network::Transport;
use std::sync::Arc;

/// The collaborators a node talks to: transport, clock, audit sink and the
/// tunables. Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct NodeEnv {
    pub transport: Arc<dyn Transport>,
    pub clock: Arc<dyn Clock>,
    pub audit: Arc<dyn AuditLog>,
    pub params: Params,
}

impl NodeEnv {
    pub fn new(
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditLog>,
        params: Params,
    ) -> Self {
        Self {
            transport,
            clock,
            audit,
            params,
        }
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn try_send(&self, from: NodeId, to: NodeId, msg: &Message) -> Result<(), bincode::Error> {
        let encoded = msg.encode()?;
        tracing::debug!("{} -> {} {}", from, to, msg.kind());
        self.transport.send(from, to, encoded);
        Ok(())
    }

    pub fn send(&self, from: NodeId, to: NodeId, msg: &Message) {
        if let Err(e) = self.try_send(from, to, msg) {
            tracing::error!("Failed to serialize {} for {}: {}", msg.kind(), to, e);
        }
    }

    pub fn record(&self, event: AuditEvent) {
        self.audit.record(event);
    }
}
