//! Replicated Storage Module
//!
//! A consistent-hashing key-value store that keeps three copies of every key
//! and answers client operations by 2-of-3 quorum.
//!
//! ## Core Concepts
//! - **Ring**: Members (self included) are hashed into a `2^32` position space
//!   and sorted; a key belongs to the first node at or after its position and
//!   that node's two successors.
//! - **Roles**: The three copies are labelled Primary, Secondary and Tertiary
//!   by their place in the triple. Labels follow the ring, not the write.
//! - **Coordination**: The node a client talks to fans the operation out to
//!   the triple and declares the outcome once two replies agree, or fails it
//!   when the operation timeout passes first.
//! - **Stabilization**: When the ring changes, every node re-pushes its keys so
//!   the current triple holds correctly labelled copies.

pub mod coordinator;
pub mod memory;
pub mod protocol;
pub mod ring;
pub mod service;
pub mod types;
