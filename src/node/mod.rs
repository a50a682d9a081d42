//! Node Module
//!
//! Glues the membership and storage layers into one peer.
//!
//! Each tick runs, in order: the coordinator timeout sweep, a full drain of
//! the inbound queue (gossip and store messages interleaved), membership
//! upkeep, a ring rebuild when membership changed, stabilization when the
//! ring changed, and finally the periodic gossip push.

pub mod env;
pub mod protocol;
pub mod service;
