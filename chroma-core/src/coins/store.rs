use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;

use bitcoin::{
    hashes::Hash, Address, Amount, BlockHash, Network, OutPoint, ScriptBuf, Transaction, Txid,
};
use log::debug;
use redb::{
    Database, MultimapTableDefinition, ReadableMultimapTable, ReadableTable, TableDefinition,
    WriteTransaction,
};

use crate::backend::ChainClient;
use crate::config::Verification;
use crate::error::{Error, Result};
use crate::keys::SigningProvider;
use crate::store::txid_from_bytes;

use super::Coin;

/// coin id -> (txid, vout, value, script, address)
const COINS: TableDefinition<u64, (&[u8], u32, u64, &[u8], &str)> = TableDefinition::new("coins");
const COINS_BY_OUTPOINT: TableDefinition<(&[u8], u32), u64> =
    TableDefinition::new("coins_by_outpoint");
const COINS_BY_ADDRESS: MultimapTableDefinition<&str, u64> =
    MultimapTableDefinition::new("coins_by_address");
/// coin id -> spending txids
const COIN_SPENDS: MultimapTableDefinition<u64, &[u8]> = MultimapTableDefinition::new("coin_spends");
/// coin id -> blocks its transaction was seen in, full verification only
const COIN_BLOCKS: MultimapTableDefinition<u64, &[u8]> = MultimapTableDefinition::new("coin_blocks");
const COIN_CONFIRMATIONS: TableDefinition<u64, u32> = TableDefinition::new("coin_confirmations");
const COIN_COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("coin_counters");

const NEXT_COIN_ID: &str = "next_coin_id";

/// Persisted wallet outputs with their spend and confirmation state.
#[derive(Clone)]
pub struct CoinStore {
    db: Arc<Database>,
    network: Network,
}

impl CoinStore {
    pub fn new(db: Arc<Database>, network: Network) -> Result<Self> {
        let txn = db.begin_write()?;
        {
            txn.open_table(COINS)?;
            txn.open_table(COINS_BY_OUTPOINT)?;
            txn.open_multimap_table(COINS_BY_ADDRESS)?;
            txn.open_multimap_table(COIN_SPENDS)?;
            txn.open_multimap_table(COIN_BLOCKS)?;
            txn.open_table(COIN_CONFIRMATIONS)?;
            txn.open_table(COIN_COUNTERS)?;
        }
        txn.commit()?;
        Ok(Self { db, network })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Insert a coin unless its outpoint is already known. Returns its id.
    pub fn add_coin(
        &self,
        address: &str,
        outpoint: OutPoint,
        value: Amount,
        script_pubkey: &ScriptBuf,
    ) -> Result<u64> {
        let txn = self.db.begin_write()?;
        let id = insert_coin(&txn, address, outpoint, value, script_pubkey)?;
        txn.commit()?;
        Ok(id)
    }

    /// Record the spends `tx` makes of stored coins and add its outputs paying
    /// to addresses `owner` holds keys for.
    pub fn apply_tx(&self, tx: &Transaction, owner: &dyn SigningProvider) -> Result<()> {
        let txid = tx.compute_txid();
        let raw_txid = txid.to_byte_array();

        let txn = self.db.begin_write()?;
        {
            let by_outpoint = txn.open_table(COINS_BY_OUTPOINT)?;
            let mut spends = txn.open_multimap_table(COIN_SPENDS)?;
            for input in &tx.input {
                let prev = input.previous_output;
                let prev_txid = prev.txid.to_byte_array();
                let coin_id = by_outpoint
                    .get((prev_txid.as_slice(), prev.vout))?
                    .map(|g| g.value());
                if let Some(coin_id) = coin_id {
                    spends.insert(coin_id, raw_txid.as_slice())?;
                    debug!("coin {} spent by {}", coin_id, txid);
                }
            }
        }

        for (vout, output) in tx.output.iter().enumerate() {
            let Ok(address) = Address::from_script(&output.script_pubkey, self.network) else {
                continue;
            };
            let address = address.to_string();
            if owner.owns(&address) {
                let outpoint = OutPoint::new(txid, vout as u32);
                insert_coin(&txn, &address, outpoint, output.value, &output.script_pubkey)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_coin(&self, coin_id: u64) -> Result<Option<Coin>> {
        let txn = self.db.begin_read()?;
        let coins = txn.open_table(COINS)?;
        let Some(guard) = coins.get(coin_id)? else {
            return Ok(None);
        };
        decode_coin(coin_id, guard.value()).map(Some)
    }

    pub fn find_coin(&self, outpoint: &OutPoint) -> Result<Option<Coin>> {
        let raw = outpoint.txid.to_byte_array();
        let txn = self.db.begin_read()?;
        let by_outpoint = txn.open_table(COINS_BY_OUTPOINT)?;
        let Some(id) = by_outpoint
            .get((raw.as_slice(), outpoint.vout))?
            .map(|g| g.value())
        else {
            return Ok(None);
        };
        let coins = txn.open_table(COINS)?;
        let coin = coins.get(id)?;
        coin.map(|g| decode_coin(id, g.value())).transpose()
    }

    /// Coins paying to `address`, oldest first.
    pub fn get_coins_for_address(&self, address: &str) -> Result<Vec<Coin>> {
        let txn = self.db.begin_read()?;
        let by_address = txn.open_multimap_table(COINS_BY_ADDRESS)?;
        let coins = txn.open_table(COINS)?;

        let mut res = Vec::new();
        for id in by_address.get(address)? {
            let id = id?.value();
            if let Some(guard) = coins.get(id)? {
                res.push(decode_coin(id, guard.value())?);
            }
        }
        Ok(res)
    }

    pub fn get_spends(&self, coin_id: u64) -> Result<Vec<Txid>> {
        let txn = self.db.begin_read()?;
        let spends = txn.open_multimap_table(COIN_SPENDS)?;
        let mut res = Vec::new();
        for txid in spends.get(coin_id)? {
            res.push(txid_from_bytes(txid?.value())?);
        }
        Ok(res)
    }

    pub fn is_spent(&self, coin_id: u64) -> Result<bool> {
        Ok(!self.get_spends(coin_id)?.is_empty())
    }

    pub fn get_confirmations(&self, coin_id: u64) -> Result<u32> {
        let txn = self.db.begin_read()?;
        let confirmations = txn.open_table(COIN_CONFIRMATIONS)?;
        Ok(confirmations.get(coin_id)?.map_or(0, |g| g.value()))
    }

    pub fn get_blocks(&self, coin_id: u64) -> Result<Vec<BlockHash>> {
        let txn = self.db.begin_read()?;
        let blocks = txn.open_multimap_table(COIN_BLOCKS)?;
        let mut res = Vec::new();
        for hash in blocks.get(coin_id)? {
            let hash = hash?;
            let hash = BlockHash::from_slice(hash.value())
                .map_err(|_| Error::Corrupt(format!("block hash of coin {}", coin_id)))?;
            res.push(hash);
        }
        Ok(res)
    }

    pub fn is_confirmed(
        &self,
        coin_id: u64,
        verification: Verification,
        min_confirmations: u32,
    ) -> Result<bool> {
        match verification {
            Verification::Full => Ok(!self.get_blocks(coin_id)?.is_empty()),
            Verification::Confirmations => {
                Ok(self.get_confirmations(coin_id)? >= min_confirmations.max(1))
            }
        }
    }

    /// Re-read the confirmation state of every unspent coin from the chain.
    pub fn refresh_confirmations<C>(&self, chain: &C, verification: Verification) -> Result<()>
    where
        C: ChainClient + ?Sized,
    {
        let unspent = self.unspent_coins()?;

        let mut heights: HashMap<Txid, Option<(BlockHash, u32)>> = HashMap::new();
        for coin in &unspent {
            let txid = coin.outpoint.txid;
            if heights.contains_key(&txid) {
                continue;
            }
            let located = match chain.get_tx_blockhash(&txid)? {
                (Some(hash), _) => Some((hash, chain.get_block_height(&hash)?)),
                (None, _) => None,
            };
            heights.insert(txid, located);
        }
        let tip = match verification {
            Verification::Confirmations => chain.get_block_count()?,
            Verification::Full => 0,
        };

        let txn = self.db.begin_write()?;
        {
            let mut blocks = txn.open_multimap_table(COIN_BLOCKS)?;
            let mut confirmations = txn.open_table(COIN_CONFIRMATIONS)?;
            for coin in &unspent {
                let located = heights.get(&coin.outpoint.txid).copied().flatten();
                match verification {
                    Verification::Full => {
                        blocks.remove_all(coin.id)?;
                        if let Some((hash, _)) = located {
                            blocks.insert(coin.id, hash.to_byte_array().as_slice())?;
                        }
                    }
                    Verification::Confirmations => {
                        let count = located.map_or(0, |(_, height)| {
                            tip.saturating_sub(height).saturating_add(1)
                        });
                        confirmations.insert(coin.id, count)?;
                    }
                }
            }
        }
        txn.commit()?;
        Ok(())
    }

    fn unspent_coins(&self) -> Result<Vec<Coin>> {
        let txn = self.db.begin_read()?;
        let coins = txn.open_table(COINS)?;
        let spends = txn.open_multimap_table(COIN_SPENDS)?;

        let spent: HashSet<u64> = spends
            .iter()?
            .map(|entry| entry.map(|(id, _)| id.value()))
            .collect::<std::result::Result<_, _>>()?;

        let mut res = Vec::new();
        for entry in coins.iter()? {
            let (id, value) = entry?;
            let id = id.value();
            if !spent.contains(&id) {
                res.push(decode_coin(id, value.value())?);
            }
        }
        Ok(res)
    }
}

fn insert_coin(
    txn: &WriteTransaction,
    address: &str,
    outpoint: OutPoint,
    value: Amount,
    script_pubkey: &ScriptBuf,
) -> Result<u64> {
    let raw_txid = outpoint.txid.to_byte_array();
    let mut by_outpoint = txn.open_table(COINS_BY_OUTPOINT)?;
    if let Some(existing) = by_outpoint.get((raw_txid.as_slice(), outpoint.vout))? {
        return Ok(existing.value());
    }

    let mut counters = txn.open_table(COIN_COUNTERS)?;
    let id = counters.get(NEXT_COIN_ID)?.map_or(1, |g| g.value());
    counters.insert(NEXT_COIN_ID, id + 1)?;

    txn.open_table(COINS)?.insert(
        id,
        (
            raw_txid.as_slice(),
            outpoint.vout,
            value.to_sat(),
            script_pubkey.as_bytes(),
            address,
        ),
    )?;
    by_outpoint.insert((raw_txid.as_slice(), outpoint.vout), id)?;
    txn.open_multimap_table(COINS_BY_ADDRESS)?.insert(address, id)?;

    debug!("coin {} added at {} for {}", id, outpoint, address);
    Ok(id)
}

fn decode_coin(id: u64, row: (&[u8], u32, u64, &[u8], &str)) -> Result<Coin> {
    let (txid, vout, value, script, address) = row;
    Ok(Coin {
        id,
        outpoint: OutPoint::new(txid_from_bytes(txid)?, vout),
        value: Amount::from_sat(value),
        script_pubkey: ScriptBuf::from_bytes(script.to_vec()),
        address: address.to_string(),
        colorvalues: Vec::new(),
    })
}

/// Parse `address` and check it belongs to `network`.
pub(crate) fn checked_address(address: &str, network: Network) -> Result<Address> {
    Address::from_str(address)
        .map_err(|e| Error::Address(e.to_string()))?
        .require_network(network)
        .map_err(|e| Error::Address(e.to_string()))
}
