use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use bitcoin::{BlockHash, Transaction, Txid};

use super::{ChainClient, SpendIndex, SpendInfo};

/// Puts a single connection behind a mutex so that concurrent scanners never
/// interleave requests on it.
pub struct SerializedChain<C> {
    inner: Mutex<C>,
}

impl<C> SerializedChain<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    pub fn into_inner(self) -> Result<C> {
        self.inner
            .into_inner()
            .map_err(|_| anyhow!("chain connection lock poisoned"))
    }

    fn lock(&self) -> Result<MutexGuard<'_, C>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("chain connection lock poisoned"))
    }
}

impl<C: ChainClient> ChainClient for SerializedChain<C> {
    fn get_tx(&self, txid: &Txid) -> Result<Transaction> {
        self.lock()?.get_tx(txid)
    }

    fn get_tx_blockhash(&self, txid: &Txid) -> Result<(Option<BlockHash>, bool)> {
        self.lock()?.get_tx_blockhash(txid)
    }

    fn get_block_height(&self, block_hash: &BlockHash) -> Result<u32> {
        self.lock()?.get_block_height(block_hash)
    }

    fn get_block_hash(&self, height: u32) -> Result<BlockHash> {
        self.lock()?.get_block_hash(height)
    }

    fn iterate_block_transactions(&self, height: u32) -> Result<Vec<Transaction>> {
        self.lock()?.iterate_block_transactions(height)
    }

    fn get_block_count(&self) -> Result<u32> {
        self.lock()?.get_block_count()
    }

    fn publish(&self, raw_tx: &[u8]) -> Result<Txid> {
        self.lock()?.publish(raw_tx)
    }
}

impl<C: SpendIndex> SpendIndex for SerializedChain<C> {
    fn get_spends(&self, txid: &Txid) -> Result<Vec<SpendInfo>> {
        self.lock()?.get_spends(txid)
    }
}
