use std::collections::HashMap;

use anyhow::{anyhow, Result};
use bitcoin::{Amount, BlockHash, Transaction, Txid};

use super::SpendInfo;

/// Read access to the base chain plus transaction broadcast.
///
/// Transport failures are returned as they are; nothing in this crate retries.
pub trait ChainClient {
    /// Fetch a transaction, confirmed or not.
    fn get_tx(&self, txid: &Txid) -> Result<Transaction>;

    /// Block containing `txid` if it is confirmed, and whether it sits in the mempool.
    fn get_tx_blockhash(&self, txid: &Txid) -> Result<(Option<BlockHash>, bool)>;

    fn get_block_height(&self, block_hash: &BlockHash) -> Result<u32>;

    fn get_block_hash(&self, height: u32) -> Result<BlockHash>;

    /// All transactions of the block at `height`, in block order.
    fn iterate_block_transactions(&self, height: u32) -> Result<Vec<Transaction>>;

    /// Height of the current tip.
    fn get_block_count(&self) -> Result<u32>;

    fn publish(&self, raw_tx: &[u8]) -> Result<Txid>;
}

/// "Which transactions spend the outputs of this one" lookups, needed by the
/// aided builder.
pub trait SpendIndex {
    /// Every known spend of an output of `txid`.
    fn get_spends(&self, txid: &Txid) -> Result<Vec<SpendInfo>>;
}

/// Amounts of the outputs spent by `tx`, in input order.
///
/// Coinbase inputs have nothing to resolve and count as zero. Previous
/// transactions are fetched once even when several inputs spend them.
pub fn resolve_input_values<C>(chain: &C, tx: &Transaction) -> Result<Vec<Amount>>
where
    C: ChainClient + ?Sized,
{
    let mut prev_txs: HashMap<Txid, Transaction> = HashMap::new();
    let mut values = Vec::with_capacity(tx.input.len());

    for input in &tx.input {
        let prevout = input.previous_output;
        if prevout.is_null() {
            values.push(Amount::ZERO);
            continue;
        }

        if !prev_txs.contains_key(&prevout.txid) {
            let prev = chain.get_tx(&prevout.txid)?;
            prev_txs.insert(prevout.txid, prev);
        }
        let value = prev_txs
            .get(&prevout.txid)
            .and_then(|prev| prev.output.get(prevout.vout as usize))
            .map(|out| out.value)
            .ok_or_else(|| anyhow!("{} has no output {}", prevout.txid, prevout.vout))?;
        values.push(value);
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use bitcoin::{
        absolute::LockTime, hashes::Hash, transaction::Version, OutPoint, ScriptBuf, Sequence,
        TxIn, TxOut, Witness,
    };

    use super::*;
    use crate::backend::SerializedChain;

    fn tx(inputs: &[OutPoint], outputs: &[u64]) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: inputs
                .iter()
                .map(|prevout| TxIn {
                    previous_output: *prevout,
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                })
                .collect(),
            output: outputs
                .iter()
                .map(|v| TxOut {
                    value: Amount::from_sat(*v),
                    script_pubkey: ScriptBuf::new(),
                })
                .collect(),
        }
    }

    /// Knows a single transaction and counts lookups of it.
    struct OneTx {
        tx: Transaction,
        lookups: Cell<usize>,
    }

    impl ChainClient for OneTx {
        fn get_tx(&self, txid: &Txid) -> Result<Transaction> {
            self.lookups.set(self.lookups.get() + 1);
            if *txid == self.tx.compute_txid() {
                Ok(self.tx.clone())
            } else {
                Err(anyhow!("unknown transaction {}", txid))
            }
        }

        fn get_tx_blockhash(&self, _: &Txid) -> Result<(Option<BlockHash>, bool)> {
            Ok((None, false))
        }

        fn get_block_height(&self, _: &BlockHash) -> Result<u32> {
            Ok(0)
        }

        fn get_block_hash(&self, _: u32) -> Result<BlockHash> {
            Ok(BlockHash::all_zeros())
        }

        fn iterate_block_transactions(&self, _: u32) -> Result<Vec<Transaction>> {
            Ok(vec![])
        }

        fn get_block_count(&self) -> Result<u32> {
            Ok(0)
        }

        fn publish(&self, _: &[u8]) -> Result<Txid> {
            Err(anyhow!("read only"))
        }
    }

    #[test]
    fn input_values_in_input_order() {
        let prev = tx(&[OutPoint::null()], &[700, 300]);
        let prev_id = prev.compute_txid();
        let chain = SerializedChain::new(OneTx {
            tx: prev,
            lookups: Cell::new(0),
        });

        let spending = tx(
            &[
                OutPoint::new(prev_id, 1),
                OutPoint::null(),
                OutPoint::new(prev_id, 0),
            ],
            &[1_000],
        );
        let values = resolve_input_values(&chain, &spending).unwrap();
        assert_eq!(
            values,
            vec![Amount::from_sat(300), Amount::ZERO, Amount::from_sat(700)]
        );
        assert_eq!(chain.into_inner().unwrap().lookups.get(), 1);
    }

    #[test]
    fn missing_outputs_are_errors() {
        let prev = tx(&[OutPoint::null()], &[700]);
        let prev_id = prev.compute_txid();
        let chain = OneTx {
            tx: prev,
            lookups: Cell::new(0),
        };

        let beyond = tx(&[OutPoint::new(prev_id, 5)], &[1]);
        assert!(resolve_input_values(&chain, &beyond).is_err());

        let unknown = tx(&[OutPoint::new(Txid::all_zeros(), 0)], &[1]);
        assert!(resolve_input_values(&chain, &unknown).is_err());
    }
}
