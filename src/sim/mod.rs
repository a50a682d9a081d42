//! Simulation Module
//!
//! In-process implementations of everything a node consumes but does not
//! own: the tick clock, the lossy address-addressed network, the audit trail,
//! and the driver that ticks every node once per round.

pub mod audit;
pub mod clock;
pub mod cluster;
pub mod network;

#[cfg(test)]
mod tests;
