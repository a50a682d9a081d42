//! Audit trail
//!
//! A one-way sink for operation outcomes and membership changes. The core
//! writes to it and never reads back; the recording implementation lets the
//! driver and the tests inspect what happened.

use crate::membership::types::NodeId;
use crate::storage::types::{Operation, TransactionId};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    /// `coordinator` separates the client-visible verdict from a replica's
    /// own local result.
    Operation {
        node: NodeId,
        coordinator: bool,
        transaction_id: TransactionId,
        op: Operation,
        outcome: Outcome,
        key: String,
        value: Option<String>,
    },
    NodeAdded {
        node: NodeId,
        peer: NodeId,
    },
    NodeRemoved {
        node: NodeId,
        peer: NodeId,
    },
}

pub trait AuditLog: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Keeps every event in memory and mirrors it to `tracing`.
#[derive(Debug, Default)]
pub struct RecordingLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Coordinator verdicts for one transaction, as `(op, outcome, value)`.
    pub fn verdicts(
        &self,
        coordinator: NodeId,
        transaction: TransactionId,
    ) -> Vec<(Operation, Outcome, Option<String>)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                AuditEvent::Operation {
                    node,
                    coordinator: true,
                    transaction_id,
                    op,
                    outcome,
                    value,
                    ..
                } if node == coordinator && transaction_id == transaction => {
                    Some((op, outcome, value))
                }
                _ => None,
            })
            .collect()
    }

    /// Number of coordinator verdicts per `(op, outcome)` across all nodes.
    pub fn verdict_count(&self, op: Operation, outcome: Outcome) -> usize {
        self.events()
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    AuditEvent::Operation { coordinator: true, op: o, outcome: r, .. }
                        if *o == op && *r == outcome
                )
            })
            .count()
    }

    pub fn removals_of(&self, peer: NodeId) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, AuditEvent::NodeRemoved { peer: p, .. } if *p == peer))
            .count()
    }
}

impl AuditLog for RecordingLog {
    fn record(&self, event: AuditEvent) {
        match &event {
            AuditEvent::Operation {
                node,
                coordinator,
                transaction_id,
                op,
                outcome,
                key,
                value,
            } => {
                let side = if *coordinator { "coordinator" } else { "server" };
                match outcome {
                    Outcome::Success => tracing::info!(
                        "{} {} {} success txn={} key={} value={:?}",
                        node,
                        side,
                        op,
                        transaction_id,
                        key,
                        value
                    ),
                    Outcome::Failure => tracing::info!(
                        "{} {} {} fail txn={} key={}",
                        node,
                        side,
                        op,
                        transaction_id,
                        key
                    ),
                }
            }
            AuditEvent::NodeAdded { node, peer } => {
                tracing::info!("{} added {} to its membership list", node, peer)
            }
            AuditEvent::NodeRemoved { node, peer } => {
                tracing::info!("{} removed {} from its membership list", node, peer)
            }
        }

        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
