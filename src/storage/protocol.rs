//! Storage Message Payloads
//!
//! Bodies of the store-layer variants of the wire `Message`. Each is copied by
//! value between nodes and never mutated after construction.

use super::types::{Entry, TransactionId};
use crate::membership::types::NodeId;
use serde::{Deserialize, Serialize};

/// A client operation dispatched by a coordinator to one replica.
///
/// The entry carries the role the receiving replica plays for `key`. For READ
/// and DELETE its value is empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Request {
    pub transaction_id: TransactionId,
    /// Coordinator the reply must go back to.
    pub from: NodeId,
    pub key: String,
    pub entry: Entry,
}

/// A replica's answer to a `Request`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reply {
    pub transaction_id: TransactionId,
    /// Replica that produced the reply.
    pub from: NodeId,
    pub success: bool,
    /// Value found, for READ replies only.
    pub value: Option<String>,
}

/// A copy pushed during stabilization. Receivers apply it as an upsert and
/// never answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Repair {
    pub transaction_id: TransactionId,
    pub from: NodeId,
    pub key: String,
    pub entry: Entry,
}
