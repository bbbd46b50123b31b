use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex, MutexGuard,
};

use anyhow::{anyhow, bail, Result};
use bitcoin::{
    consensus::encode::deserialize,
    hashes::{sha256d, Hash},
    BlockHash, Transaction, Txid,
};
use chroma_core::{ChainClient, SpendIndex, SpendInfo};

struct Block {
    hash: BlockHash,
    txs: Vec<Transaction>,
}

struct ChainState {
    /// index is height; block 0 is empty
    blocks: Vec<Block>,
    mempool: Vec<Transaction>,
    /// bumped on every reorg so replaced blocks get new hashes
    fork: u32,
}

/// How often each chain method was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCount {
    pub get_tx: usize,
    pub get_tx_blockhash: usize,
    pub get_block_height: usize,
    pub get_block_hash: usize,
    pub iterate_block_transactions: usize,
    pub get_block_count: usize,
    pub publish: usize,
    pub get_spends: usize,
}

#[derive(Default)]
struct Counters {
    get_tx: AtomicUsize,
    get_tx_blockhash: AtomicUsize,
    get_block_height: AtomicUsize,
    get_block_hash: AtomicUsize,
    iterate_block_transactions: AtomicUsize,
    get_block_count: AtomicUsize,
    publish: AtomicUsize,
    get_spends: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// A chain kept in memory, mined by hand, that counts every request made to it.
pub struct MemoryChain {
    state: Mutex<ChainState>,
    counters: Counters,
}

impl Default for MemoryChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChain {
    pub fn new() -> Self {
        let genesis = Block {
            hash: block_hash(0, 0, &[]),
            txs: vec![],
        };
        Self {
            state: Mutex::new(ChainState {
                blocks: vec![genesis],
                mempool: vec![],
                fork: 0,
            }),
            counters: Counters::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap()
    }

    pub fn tip(&self) -> u32 {
        (self.state().blocks.len() - 1) as u32
    }

    pub fn add_to_mempool(&self, tx: Transaction) -> Txid {
        let txid = tx.compute_txid();
        self.state().mempool.push(tx);
        txid
    }

    /// Mine the mempool into a new block and return its height.
    pub fn mine(&self) -> u32 {
        let txs = std::mem::take(&mut self.state().mempool);
        self.mine_block(txs)
    }

    pub fn mine_block(&self, txs: Vec<Transaction>) -> u32 {
        let mut state = self.state();
        let height = state.blocks.len() as u32;
        let hash = block_hash(height, state.fork, &txs);
        state.blocks.push(Block { hash, txs });
        height
    }

    /// Drop every block from `height` up and mine `blocks` in their place.
    pub fn reorg(&self, height: u32, blocks: Vec<Vec<Transaction>>) {
        {
            let mut state = self.state();
            state.blocks.truncate(height as usize);
            state.fork += 1;
        }
        for txs in blocks {
            self.mine_block(txs);
        }
    }

    pub fn calls(&self) -> CallCount {
        let c = &self.counters;
        let get = |a: &AtomicUsize| a.load(Ordering::Relaxed);
        CallCount {
            get_tx: get(&c.get_tx),
            get_tx_blockhash: get(&c.get_tx_blockhash),
            get_block_height: get(&c.get_block_height),
            get_block_hash: get(&c.get_block_hash),
            iterate_block_transactions: get(&c.iterate_block_transactions),
            get_block_count: get(&c.get_block_count),
            publish: get(&c.publish),
            get_spends: get(&c.get_spends),
        }
    }

    fn find_confirmed(&self, txid: &Txid) -> Option<(u32, BlockHash)> {
        let state = self.state();
        state.blocks.iter().enumerate().find_map(|(height, block)| {
            block
                .txs
                .iter()
                .any(|tx| tx.compute_txid() == *txid)
                .then_some((height as u32, block.hash))
        })
    }
}

fn block_hash(height: u32, fork: u32, txs: &[Transaction]) -> BlockHash {
    let mut data = Vec::new();
    data.extend_from_slice(&height.to_le_bytes());
    data.extend_from_slice(&fork.to_le_bytes());
    for tx in txs {
        data.extend_from_slice(&tx.compute_txid().to_byte_array());
    }
    BlockHash::from_raw_hash(sha256d::Hash::hash(&data))
}

impl ChainClient for MemoryChain {
    fn get_tx(&self, txid: &Txid) -> Result<Transaction> {
        bump(&self.counters.get_tx);
        let state = self.state();
        state
            .blocks
            .iter()
            .flat_map(|b| b.txs.iter())
            .chain(state.mempool.iter())
            .find(|tx| tx.compute_txid() == *txid)
            .cloned()
            .ok_or_else(|| anyhow!("unknown transaction {}", txid))
    }

    fn get_tx_blockhash(&self, txid: &Txid) -> Result<(Option<BlockHash>, bool)> {
        bump(&self.counters.get_tx_blockhash);
        if let Some((_, hash)) = self.find_confirmed(txid) {
            return Ok((Some(hash), false));
        }
        let in_mempool = self
            .state()
            .mempool
            .iter()
            .any(|tx| tx.compute_txid() == *txid);
        Ok((None, in_mempool))
    }

    fn get_block_height(&self, block_hash: &BlockHash) -> Result<u32> {
        bump(&self.counters.get_block_height);
        self.state()
            .blocks
            .iter()
            .position(|b| b.hash == *block_hash)
            .map(|h| h as u32)
            .ok_or_else(|| anyhow!("unknown block {}", block_hash))
    }

    fn get_block_hash(&self, height: u32) -> Result<BlockHash> {
        bump(&self.counters.get_block_hash);
        match self.state().blocks.get(height as usize) {
            Some(block) => Ok(block.hash),
            None => bail!("no block at height {}", height),
        }
    }

    fn iterate_block_transactions(&self, height: u32) -> Result<Vec<Transaction>> {
        bump(&self.counters.iterate_block_transactions);
        match self.state().blocks.get(height as usize) {
            Some(block) => Ok(block.txs.clone()),
            None => bail!("no block at height {}", height),
        }
    }

    fn get_block_count(&self) -> Result<u32> {
        bump(&self.counters.get_block_count);
        Ok(self.tip())
    }

    fn publish(&self, raw_tx: &[u8]) -> Result<Txid> {
        bump(&self.counters.publish);
        let tx: Transaction = deserialize(raw_tx)?;
        Ok(self.add_to_mempool(tx))
    }
}

impl SpendIndex for MemoryChain {
    fn get_spends(&self, txid: &Txid) -> Result<Vec<SpendInfo>> {
        bump(&self.counters.get_spends);
        let state = self.state();
        let mut spends = Vec::new();
        for (height, block) in state.blocks.iter().enumerate() {
            for tx in &block.txs {
                for input in &tx.input {
                    if input.previous_output.txid == *txid {
                        spends.push(SpendInfo {
                            output_index: input.previous_output.vout,
                            spending_txid: tx.compute_txid(),
                            height: height as u32,
                        });
                    }
                }
            }
        }
        Ok(spends)
    }
}
