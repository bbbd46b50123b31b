use std::sync::Arc;

use bitcoin::Txid;

use crate::backend::SharedChain;
use crate::color::{ColorId, ColorValue};
use crate::error::{Error, Result};
use crate::scanner::ColorDataBuilderManager;
use crate::store::ColorStore;

/// Color values of individual outputs, scanning on demand.
pub struct ColorData {
    chain: SharedChain,
    builders: Arc<ColorDataBuilderManager>,
    store: ColorStore,
}

impl ColorData {
    pub fn new(chain: SharedChain, builders: Arc<ColorDataBuilderManager>, store: ColorStore) -> Self {
        Self {
            chain,
            builders,
            store,
        }
    }

    pub fn builders(&self) -> &ColorDataBuilderManager {
        &self.builders
    }

    /// Color values of output `vout` of `txid`, restricted to `color_ids`.
    ///
    /// Every color in the set is first scanned up to the block containing the
    /// transaction. Unconfirmed transactions have no color yet and fail with
    /// [`Error::TransactionNotFound`].
    pub fn get_colorvalues(
        &self,
        color_ids: &[ColorId],
        txid: &Txid,
        vout: u32,
    ) -> Result<Vec<ColorValue>> {
        let (blockhash, _in_mempool) = self.chain.get_tx_blockhash(txid)?;
        let Some(blockhash) = blockhash else {
            return Err(Error::TransactionNotFound(*txid));
        };
        let height = self.chain.get_block_height(&blockhash)?;

        self.builders.ensure_scanned_upto(color_ids, height)?;

        Ok(self
            .store
            .get_any(txid, vout)?
            .into_iter()
            .filter(|cv| color_ids.contains(&cv.color_id()))
            .collect())
    }
}
