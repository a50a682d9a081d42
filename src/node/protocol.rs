//! Wire Protocol
//!
//! Every message a node can receive, gossip and store layers alike, is one
//! variant of `Message`. Messages are bincode-encoded for the transport; the
//! byte layout is bincode's, only the fields and their meaning are fixed.

use crate::membership::types::{MemberDigest, NodeId};
use crate::storage::protocol::{Reply, Repair, Request};
use crate::storage::types::Operation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Message {
    /// Sent by a joiner to the introducer.
    JoinReq { from: NodeId, heartbeat: u64 },
    /// The introducer's answer: its filtered table plus its own heartbeat.
    JoinRep {
        from: NodeId,
        heartbeat: u64,
        members: Vec<MemberDigest>,
    },
    /// Periodic anti-entropy push of the sender's filtered table.
    Heartbeat {
        from: NodeId,
        heartbeat: u64,
        members: Vec<MemberDigest>,
    },
    Create(Request),
    Read(Request),
    Update(Request),
    Delete(Request),
    Reply(Reply),
    Repair(Repair),
}

impl Message {
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::JoinReq { .. } => "JOINREQ",
            Message::JoinRep { .. } => "JOINREP",
            Message::Heartbeat { .. } => "HEARTBEAT",
            Message::Create(_) => "CREATE",
            Message::Read(_) => "READ",
            Message::Update(_) => "UPDATE",
            Message::Delete(_) => "DELETE",
            Message::Reply(_) => "REPLY",
            Message::Repair(_) => "REPAIR",
        }
    }

    /// Wraps a replica request in the variant matching its operation.
    pub fn request(op: Operation, request: Request) -> Self {
        match op {
            Operation::Create => Message::Create(request),
            Operation::Read => Message::Read(request),
            Operation::Update => Message::Update(request),
            Operation::Delete => Message::Delete(request),
        }
    }
}
