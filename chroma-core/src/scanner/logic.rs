use std::collections::{HashMap, HashSet, VecDeque};

use bitcoin::{Transaction, Txid};
use log::{debug, warn};

use crate::backend::{resolve_input_values, ChainClient};
use crate::color::{ColorDefinition, ColorId};
use crate::error::{Error, Result};
use crate::store::ColorBatch;

use super::ScanContext;

/// Run the kernel of `def` on `tx` and stage the colored outputs in `batch`.
///
/// Transactions with no input carrying this color are skipped without
/// touching the chain, except the color's genesis transaction. Returns
/// whether the kernel ran.
pub(crate) fn scan_tx<C>(
    def: &ColorDefinition,
    chain: &C,
    batch: &mut ColorBatch,
    tx: &Transaction,
    height: u32,
) -> Result<bool>
where
    C: ChainClient + ?Sized,
{
    let color_id = def.color_id();
    let txid = tx.compute_txid();

    let mut in_colorvalues = Vec::with_capacity(tx.input.len());
    for input in &tx.input {
        let prevout = input.previous_output;
        let colorvalue = if prevout.is_null() {
            None
        } else {
            batch
                .get_any(&prevout.txid, prevout.vout)?
                .into_iter()
                .find(|cv| cv.color_id() == color_id)
        };
        in_colorvalues.push(colorvalue);
    }

    if in_colorvalues.iter().all(Option::is_none) && !def.is_special_tx(&txid) {
        return Ok(false);
    }

    let input_values = resolve_input_values(chain, tx)?;
    let out_colorvalues = def.run_kernel(tx, &input_values, &in_colorvalues);

    for (input, colorvalue) in tx.input.iter().zip(&in_colorvalues) {
        if colorvalue.is_some() {
            let prevout = input.previous_output;
            batch.mark_spent(color_id, &prevout.txid, prevout.vout, height)?;
        }
    }

    let mut colored = 0;
    for (vout, colorvalue) in out_colorvalues.iter().enumerate() {
        if let Some(cv) = colorvalue {
            batch.add(color_id, &txid, vout as u32, cv.amount(), cv.label(), height)?;
            colored += 1;
        }
    }
    debug!(
        "color {}: {} has {} colored outputs",
        color_id, txid, colored
    );

    Ok(true)
}

/// First height a scan for `def` has to look at, given the current checkpoint.
pub(crate) fn first_unscanned_height(def: &ColorDefinition, scanned: Option<u32>) -> u32 {
    let genesis_height = def.genesis().map_or(1, |g| g.height);
    scanned.map_or(0, |h| h + 1).max(genesis_height)
}

/// Scan height of `color_id` after checking its checkpoint block is still on
/// the chain.
///
/// When it is not, records written above `height - reorg_depth` are dropped
/// and the checkpoint is moved back there before returning.
pub(crate) fn checked_scan_height(ctx: &ScanContext, color_id: ColorId) -> Result<Option<u32>> {
    let Some(checkpoint) = ctx.meta.get_checkpoint(color_id)? else {
        return Ok(None);
    };
    let Some(hash) = checkpoint.block_hash else {
        return Ok(Some(checkpoint.height));
    };

    let tip = ctx.chain.get_block_count()?;
    if checkpoint.height <= tip && ctx.chain.get_block_hash(checkpoint.height)? == hash {
        return Ok(Some(checkpoint.height));
    }

    let rollback_to = checkpoint
        .height
        .saturating_sub(ctx.reorg_depth())
        .min(tip);

    let mut batch = ctx.store.begin_batch()?;
    let dropped = batch.truncate_above(color_id, rollback_to)?;
    batch.set_scan_height(color_id, rollback_to, None)?;
    batch.commit()?;

    warn!(
        "color {}: block {} at height {} left the chain, rolled back to {} ({} records dropped)",
        color_id, hash, checkpoint.height, rollback_to, dropped
    );
    Ok(Some(rollback_to))
}

/// Order transactions of one block so that each comes after the ones it
/// spends from.
pub(crate) fn toposort(
    txs: Vec<(Txid, Transaction)>,
    height: u32,
) -> Result<Vec<(Txid, Transaction)>> {
    let ids: Vec<Txid> = txs.iter().map(|(txid, _)| *txid).collect();
    let parents: Vec<Vec<Txid>> = txs
        .iter()
        .map(|(_, tx)| tx.input.iter().map(|i| i.previous_output.txid).collect())
        .collect();

    let order = dependency_order(&ids, &parents, height)?;

    let mut slots: Vec<Option<(Txid, Transaction)>> = txs.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}

/// Kahn's algorithm over "spends an output of" edges. Parents outside `ids`
/// are ignored. Ties keep the input order.
pub(crate) fn dependency_order(ids: &[Txid], parents: &[Vec<Txid>], height: u32) -> Result<Vec<usize>> {
    let index: HashMap<Txid, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let mut indegree = vec![0usize; ids.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
    for (child, parent_ids) in parents.iter().enumerate() {
        let mut seen = HashSet::new();
        for parent in parent_ids.iter().filter_map(|p| index.get(p)) {
            if seen.insert(*parent) {
                indegree[child] += 1;
                children[*parent].push(child);
            }
        }
    }

    let mut ready: VecDeque<usize> = (0..ids.len()).filter(|i| indegree[*i] == 0).collect();
    let mut order = Vec::with_capacity(ids.len());
    while let Some(next) = ready.pop_front() {
        order.push(next);
        for child in &children[next] {
            indegree[*child] -= 1;
            if indegree[*child] == 0 {
                ready.push_back(*child);
            }
        }
    }

    if order.len() != ids.len() {
        return Err(Error::GraphCyclic(height));
    }
    Ok(order)
}
