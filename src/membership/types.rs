use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of a node, derived from its 6-byte transport address
/// (4-byte id followed by a 2-byte port).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub id: u32,
    pub port: u16,
}

impl NodeId {
    pub const fn new(id: u32, port: u16) -> Self {
        Self { id, port }
    }

    pub fn from_bytes(addr: [u8; 6]) -> Self {
        Self {
            id: u32::from_le_bytes([addr[0], addr[1], addr[2], addr[3]]),
            port: u16::from_le_bytes([addr[4], addr[5]]),
        }
    }

    pub fn to_bytes(self) -> [u8; 6] {
        let id = self.id.to_le_bytes();
        let port = self.port.to_le_bytes();
        [id[0], id[1], id[2], id[3], port[0], port[1]]
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.id.to_le_bytes();
        write!(f, "{}.{}.{}.{}:{}", b[0], b[1], b[2], b[3], self.port)
    }
}

impl FromStr for NodeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("missing port in address {s:?}"))?;
        let port: u16 = port
            .parse()
            .map_err(|e| format!("bad port in address {s:?}: {e}"))?;

        let mut octets = [0u8; 4];
        let mut parts = host.split('.');
        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| format!("address {s:?} needs four octets"))?;
            *octet = part
                .parse()
                .map_err(|e| format!("bad octet {part:?} in {s:?}: {e}"))?;
        }
        if parts.next().is_some() {
            return Err(format!("address {s:?} has more than four octets"));
        }

        Ok(Self {
            id: u32::from_le_bytes(octets),
            port,
        })
    }
}

/// Lifecycle of the membership layer on one node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeStatus {
    Uninitialized,
    /// Local state is ready, the join handshake has not completed.
    NotInGroup,
    InGroup,
    ShutDown,
}

/// A peer as this node sees it.
///
/// `last_update` is the local tick at which `heartbeat` last advanced; it never
/// leaves the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberEntry {
    pub node: NodeId,
    pub heartbeat: u64,
    pub last_update: u64,
}

impl MemberEntry {
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_update)
    }

    pub fn digest(&self) -> MemberDigest {
        MemberDigest {
            node: self.node,
            heartbeat: self.heartbeat,
        }
    }
}

/// The gossiped form of a membership entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberDigest {
    pub node: NodeId,
    pub heartbeat: u64,
}

/// How an entry is treated when a snapshot is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Fresh enough to be gossiped.
    Alive,
    /// Past `tfail`: kept locally, withheld from gossip.
    Suspected,
    /// Past `tremove`: purged.
    Expired,
}
