//! Gossip-Membership Replicated Key-Value Store
//!
//! Every node keeps its own view of the cluster through heartbeat gossip,
//! hashes that view into a ring, and stores each key on three ring-adjacent
//! nodes. Client operations resolve by 2-of-3 quorum; ring changes trigger a
//! re-replication pass that restores three correctly labelled copies.
//!
//! ## Architecture Modules
//! - **`membership`**: Join handshake, heartbeat gossip and silence-based
//!   failure detection.
//! - **`storage`**: The ring, the local store, the quorum coordinator and
//!   stabilization.
//! - **`node`**: The wire message type and the per-tick node that ties both
//!   layers together.
//! - **`sim`**: Tick clock, lossy network, audit trail and the round-based
//!   cluster driver.
//! - **`config`**: Failure-detector, timeout and simulation tunables.

pub mod config;
pub mod error;
pub mod membership;
pub mod node;
pub mod sim;
pub mod storage;
