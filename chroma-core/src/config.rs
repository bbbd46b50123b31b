use std::path::Path;

use bitcoin::Network;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_FEE_RATE_SAT_VB, DEFAULT_MIN_CONFIRMATIONS, DEFAULT_REORG_DEPTH};
use crate::error::Result;

/// Which scanning strategy the builder manager instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuilderKind {
    #[default]
    FullScan,
    /// Requires a spend index.
    Aided,
}

/// How the coin store decides a coin is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    /// Track the block each coin's transaction is in.
    Full,
    /// Track a confirmation count per coin.
    #[default]
    Confirmations,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromaConfig {
    pub network: Network,
    pub builder: BuilderKind,
    pub fee_rate_sat_vb: u64,
    pub verification: Verification,
    pub min_confirmations: u32,
    /// Blocks rolled back when a checkpoint's block is no longer on the chain.
    pub reorg_depth: u32,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            network: Network::Bitcoin,
            builder: BuilderKind::default(),
            fee_rate_sat_vb: DEFAULT_FEE_RATE_SAT_VB,
            verification: Verification::default(),
            min_confirmations: DEFAULT_MIN_CONFIRMATIONS,
            reorg_depth: DEFAULT_REORG_DEPTH,
        }
    }
}

impl ChromaConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}
