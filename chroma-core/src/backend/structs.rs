use std::sync::Arc;

use bitcoin::Txid;
use serde::{Deserialize, Serialize};

use super::{ChainClient, SpendIndex};

/// A chain client shared between builders, queries and the pipeline.
pub type SharedChain = Arc<dyn ChainClient + Send + Sync>;

pub type SharedSpendIndex = Arc<dyn SpendIndex + Send + Sync>;

/// One output of a queried transaction being spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpendInfo {
    /// Index of the spent output in the queried transaction.
    pub output_index: u32,
    pub spending_txid: Txid,
    /// Height of the block containing the spending transaction.
    pub height: u32,
}
