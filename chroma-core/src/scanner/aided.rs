use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use bitcoin::Txid;
use log::{debug, info};

use crate::backend::{SharedSpendIndex, SpendInfo};
use crate::color::{ColorDefinition, ColorId, Genesis};
use crate::error::{Error, Result};

use super::{logic, ColorDataBuilder, ScanContext};

/// Spending transactions waiting to be scanned, by block height.
type Pending = BTreeMap<u32, Vec<Txid>>;

/// Follows the spend graph of a color instead of reading whole blocks.
///
/// Only transactions reachable from the genesis output through spends of
/// colored outputs are fetched. Blocks in between are never looked at.
pub struct AidedBuilder {
    def: Arc<ColorDefinition>,
    ctx: ScanContext,
    spends: SharedSpendIndex,
    scan_lock: Mutex<()>,
}

impl AidedBuilder {
    pub fn new(def: Arc<ColorDefinition>, ctx: ScanContext, spends: SharedSpendIndex) -> Self {
        Self {
            def,
            ctx,
            spends,
            scan_lock: Mutex::new(()),
        }
    }

    /// Initial frontier: the genesis transaction if it is not scanned yet, and
    /// spends at or after `start` of colored outputs whose spend was not
    /// scanned yet.
    fn seed(&self, genesis: &Genesis, start: u32) -> Result<Pending> {
        let mut pending = Pending::new();
        if genesis.height >= start {
            pending.entry(genesis.height).or_default().push(genesis.txid);
        }

        let mut unspent: HashMap<Txid, HashSet<u32>> = HashMap::new();
        for record in self.ctx.store.get_unspent(self.def.color_id())? {
            unspent.entry(record.txid).or_default().insert(record.vout);
        }
        for (txid, vouts) in unspent {
            for spend in self.spends.get_spends(&txid)? {
                if vouts.contains(&spend.output_index) && spend.height >= start {
                    pending
                        .entry(spend.height)
                        .or_default()
                        .push(spend.spending_txid);
                }
            }
        }

        Ok(pending)
    }

    /// Scan the transactions of block `blkheight` reachable from `seeds`, then
    /// queue spends in later blocks of the outputs that turned out colored.
    fn scan_block(&self, blkheight: u32, seeds: Vec<Txid>, pending: &mut Pending) -> Result<()> {
        let color_id = self.def.color_id();

        let mut found = Vec::new();
        let mut seen = HashSet::new();
        let mut later: Vec<(Txid, SpendInfo)> = Vec::new();
        let mut work: VecDeque<Txid> = seeds.into();

        while let Some(txid) = work.pop_front() {
            if !seen.insert(txid) {
                continue;
            }
            let tx = self.ctx.chain.get_tx(&txid)?;
            for spend in self.spends.get_spends(&txid)? {
                if spend.height == blkheight {
                    work.push_back(spend.spending_txid);
                } else if spend.height > blkheight {
                    later.push((txid, spend));
                }
            }
            found.push((txid, tx));
        }

        let ordered = logic::toposort(found, blkheight)?;
        let blkhash = self.ctx.chain.get_block_hash(blkheight)?;

        let mut batch = self.ctx.store.begin_batch()?;
        for (_, tx) in &ordered {
            logic::scan_tx(&self.def, self.ctx.chain.as_ref(), &mut batch, tx, blkheight)?;
        }
        for (txid, spend) in later {
            let carries_color = batch
                .get_any(&txid, spend.output_index)?
                .iter()
                .any(|cv| cv.color_id() == color_id);
            if carries_color {
                pending
                    .entry(spend.height)
                    .or_default()
                    .push(spend.spending_txid);
            }
        }
        batch.set_scan_height(color_id, blkheight, Some(blkhash))?;
        batch.commit()?;

        debug!(
            "color {}: block {} scanned, {} transactions reached",
            color_id,
            blkheight,
            ordered.len()
        );
        Ok(())
    }
}

impl ColorDataBuilder for AidedBuilder {
    fn color_id(&self) -> ColorId {
        self.def.color_id()
    }

    fn ensure_scanned_upto(&self, height: u32) -> Result<()> {
        let _guard = self.scan_lock.lock().unwrap_or_else(|e| e.into_inner());
        let color_id = self.def.color_id();

        if self
            .ctx
            .meta
            .get_scan_height(color_id)?
            .is_some_and(|scanned| scanned >= height)
        {
            return Ok(());
        }
        let Some(genesis) = self.def.genesis().copied() else {
            return Ok(());
        };

        let scanned = logic::checked_scan_height(&self.ctx, color_id)?;
        let start = logic::first_unscanned_height(&self.def, scanned);
        if start > height {
            return Ok(());
        }

        info!("color {}: aided scan {}..={}", color_id, start, height);
        let start_time = Instant::now();

        let mut pending = self.seed(&genesis, start)?;
        while let Some((blkheight, txids)) = pending.pop_first() {
            if blkheight > height {
                break;
            }
            if self.ctx.interrupt_requested() {
                info!("color {}: scan interrupted before block {}", color_id, blkheight);
                return Err(Error::Interrupted(blkheight));
            }
            self.scan_block(blkheight, txids, &mut pending)?;
        }

        // nothing colored moved between the last block reached and `height`
        let blkhash = self.ctx.chain.get_block_hash(height)?;
        let mut batch = self.ctx.store.begin_batch()?;
        batch.set_scan_height(color_id, height, Some(blkhash))?;
        batch.commit()?;

        info!(
            "color {}: aided scan complete in {} seconds",
            color_id,
            start_time.elapsed().as_secs()
        );
        Ok(())
    }
}
