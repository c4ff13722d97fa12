//! Runtime configuration for the simulators
//!
//! The probability and delay constants the lessons rely on are injectable here
//! rather than baked in, so a host can tune them and tests can pin them.

use crate::constants::*;
use crate::types::Amount;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Probability that a full or mining peer deems an artifact valid.
    pub validation_success: f64,
    /// Simulated per-index propagation delay, in milliseconds.
    pub propagation_base_delay_ms: u64,
    /// Peer mix for `standard_network`.
    pub full_peers: usize,
    pub light_peers: usize,
    pub mining_peers: usize,
    /// Fee attached to lesson transactions.
    pub default_fee: Amount,
    /// Nonce attempts granted to the toy miner.
    pub mining_max_attempts: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            validation_success: DEFAULT_VALIDATION_SUCCESS,
            propagation_base_delay_ms: PROPAGATION_BASE_DELAY_MS,
            full_peers: 3,
            light_peers: 2,
            mining_peers: 2,
            default_fee: DEFAULT_FEE,
            mining_max_attempts: DEFAULT_MINING_ATTEMPTS,
        }
    }
}

impl SimConfig {
    /// Parse a configuration from a JSON document. Missing fields fall back to
    /// the defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn peer_count(&self) -> usize {
        self.full_peers + self.light_peers + self.mining_peers
    }
}
