//! Tunables
//!
//! `Params` carries the failure-detector and coordinator thresholds every node
//! reads; `SimConfig` adds the knobs the simulation driver needs. Both load
//! from JSON with every field defaulted, so a config file only has to name
//! what it changes.

use crate::membership::types::NodeId;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Ticks without a fresh heartbeat before a peer stops being gossiped.
pub const DEFAULT_TFAIL: u64 = 5;
/// Ticks without a fresh heartbeat before a peer is purged.
pub const DEFAULT_TREMOVE: u64 = 20;
/// Ticks a coordinator waits for a quorum before failing the operation.
pub const DEFAULT_OP_TIMEOUT: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Params {
    pub tfail: u64,
    pub tremove: u64,
    pub op_timeout: u64,
    /// Well-known address every joiner sends its JOINREQ to.
    pub introducer: NodeId,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            tfail: DEFAULT_TFAIL,
            tremove: DEFAULT_TREMOVE,
            op_timeout: DEFAULT_OP_TIMEOUT,
            introducer: NodeId::new(1, 0),
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<()> {
        if self.tfail >= self.tremove {
            bail!(
                "tfail ({}) must be smaller than tremove ({})",
                self.tfail,
                self.tremove
            );
        }
        if self.op_timeout == 0 {
            bail!("op_timeout must be at least one tick");
        }
        Ok(())
    }
}

/// Driver configuration for a simulated run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    pub params: Params,
    pub nodes: usize,
    pub rounds: u64,
    pub seed: u64,
    /// Probability in `[0, 1)` that a single message is lost.
    pub drop_rate: f64,
    /// Upper bound (inclusive) on extra ticks a message may be delayed.
    pub max_delay: u64,
    /// Ticks between consecutive node starts.
    pub join_interval: u64,
    /// Round at which the CRUD workload is issued.
    pub workload_at: u64,
    /// Round at which `fail_count` nodes stop ticking.
    pub fail_at: Option<u64>,
    pub fail_count: usize,
    pub keys: usize,
    /// Wall-clock pacing between rounds; zero runs flat out.
    pub tick_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            params: Params::default(),
            nodes: 10,
            rounds: 300,
            seed: 7,
            drop_rate: 0.0,
            max_delay: 0,
            join_interval: 1,
            workload_at: 60,
            fail_at: Some(120),
            fail_count: 1,
            keys: 20,
            tick_ms: 0,
        }
    }
}

impl SimConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: SimConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;
        if self.nodes == 0 {
            bail!("a simulation needs at least one node");
        }
        if !(0.0..1.0).contains(&self.drop_rate) {
            bail!("drop_rate must be in [0, 1), got {}", self.drop_rate);
        }
        if self.fail_count >= self.nodes && self.fail_at.is_some() {
            bail!(
                "cannot fail {} of {} nodes",
                self.fail_count,
                self.nodes
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Params::default().validate().is_ok());
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: SimConfig =
            serde_json::from_str(r#"{"nodes": 4, "params": {"tfail": 3}}"#).unwrap();

        assert_eq!(config.nodes, 4);
        assert_eq!(config.params.tfail, 3);
        assert_eq!(config.params.tremove, DEFAULT_TREMOVE);
        assert_eq!(config.rounds, SimConfig::default().rounds);
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let params = Params {
            tfail: 30,
            tremove: 20,
            ..Params::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_rejects_certain_loss() {
        let config = SimConfig {
            drop_rate: 1.0,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
