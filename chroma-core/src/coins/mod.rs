//! Wallet coins and color-aware coin queries.

mod query;
mod store;

use bitcoin::{Amount, OutPoint, ScriptBuf};

use crate::color::{ColorId, ColorValue};

pub use query::{CoinQuery, CoinQueryParams};
pub use store::CoinStore;

pub(crate) use store::checked_address;

/// A wallet-owned output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coin {
    pub id: u64,
    pub outpoint: OutPoint,
    pub value: Amount,
    pub script_pubkey: ScriptBuf,
    pub address: String,
    /// Attached by [`CoinQuery`]; a cache, not persisted with the coin.
    pub colorvalues: Vec<ColorValue>,
}

impl Coin {
    pub fn colorvalue(&self, color_id: ColorId) -> Option<&ColorValue> {
        self.colorvalues.iter().find(|cv| cv.color_id() == color_id)
    }
}
