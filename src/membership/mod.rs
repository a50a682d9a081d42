//! Membership & Failure Detection Module
//!
//! Implements a heartbeat-gossip membership protocol so every node keeps an
//! eventually-consistent view of which peers are alive.
//!
//! ## Core Mechanisms
//! - **Join**: A new node sends JOINREQ to a well-known introducer, which
//!   answers with its filtered table. The introducer itself joins by fiat.
//! - **Gossip**: Every tick, each node pushes its filtered table to
//!   `ceil(n/2) + 1` peers starting from a random index.
//! - **Implicit Failure Detection**: A peer whose heartbeat stops advancing is
//!   withheld from gossip after `tfail` ticks and purged after `tremove`. No
//!   "down" message exists; silence is the signal.
//! - **Monotonic Merge**: A known entry only moves forward on a strictly
//!   greater heartbeat, so stale duplicates cannot revive a peer.

pub mod service;
pub mod table;
pub mod types;

#[cfg(test)]
mod tests;
