//! Coordinator-side transaction bookkeeping.
//!
//! Each client operation fans out to three replicas and is tracked here until
//! two replies agree (the verdict) or the timeout sweep gives up on it. The
//! tracker is owned by a single node; nothing is shared between nodes.

use super::types::{Operation, TransactionId};
use std::collections::HashMap;

/// Replies of the same outcome needed for a verdict.
pub const QUORUM: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub op: Operation,
    pub key: String,
    /// Value the client asked to write; empty for READ and DELETE.
    pub value: String,
    pub successes: u32,
    pub failures: u32,
    pub issued_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// `value` is the value carried by the deciding reply (READ only).
    Success { value: Option<String> },
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub id: TransactionId,
    pub transaction: Transaction,
    pub verdict: Verdict,
}

#[derive(Debug, Default)]
pub struct Coordinator {
    next_id: TransactionId,
    pending: HashMap<TransactionId, Transaction>,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_transaction_id(&mut self) -> TransactionId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn register(
        &mut self,
        id: TransactionId,
        op: Operation,
        key: &str,
        value: &str,
        now: u64,
    ) {
        self.pending.insert(
            id,
            Transaction {
                op,
                key: key.to_string(),
                value: value.to_string(),
                successes: 0,
                failures: 0,
                issued_at: now,
            },
        );
    }

    pub fn get(&self, id: TransactionId) -> Option<&Transaction> {
        self.pending.get(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Tallies one replica reply. The second reply of either outcome decides
    /// the transaction, which is then forgotten; the remaining reply finds
    /// nothing and is ignored.
    pub fn record_reply(
        &mut self,
        id: TransactionId,
        success: bool,
        value: Option<String>,
    ) -> Option<Resolved> {
        let Some(transaction) = self.pending.get_mut(&id) else {
            tracing::debug!("Reply for unknown or closed transaction {}", id);
            return None;
        };

        let verdict = if success {
            transaction.successes += 1;
            (transaction.successes >= QUORUM).then_some(Verdict::Success { value })
        } else {
            transaction.failures += 1;
            (transaction.failures >= QUORUM).then_some(Verdict::Failure)
        }?;

        let transaction = self.pending.remove(&id)?;
        Some(Resolved {
            id,
            transaction,
            verdict,
        })
    }

    /// Removes and returns every transaction older than `timeout` ticks.
    pub fn sweep(&mut self, now: u64, timeout: u64) -> Vec<Resolved> {
        let mut expired: Vec<TransactionId> = self
            .pending
            .iter()
            .filter(|(_, t)| now.saturating_sub(t.issued_at) > timeout)
            .map(|(id, _)| *id)
            .collect();
        expired.sort_unstable();

        expired
            .into_iter()
            .filter_map(|id| {
                self.pending.remove(&id).map(|transaction| Resolved {
                    id,
                    transaction,
                    verdict: Verdict::Failure,
                })
            })
            .collect()
    }
}
