use std::sync::Arc;

use bitcoin::{hashes::Hash, BlockHash};
use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};

use crate::color::ColorId;
use crate::error::{Error, Result};

pub(crate) const COLOR_IDS: TableDefinition<&str, i64> = TableDefinition::new("color_ids");
pub(crate) const COLOR_DESCRIPTORS: TableDefinition<i64, &str> =
    TableDefinition::new("color_descriptors");
/// color id -> (scan height, block hash at that height or empty)
pub(crate) const SCAN_HEIGHTS: TableDefinition<i64, (u32, &[u8])> =
    TableDefinition::new("scan_heights");
pub(crate) const COUNTERS: TableDefinition<&str, i64> = TableDefinition::new("counters");

const NEXT_COLOR_ID: &str = "next_color_id";

/// How far a color has been scanned, and on which chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub height: u32,
    pub block_hash: Option<BlockHash>,
}

/// Descriptor registry and per-color scan checkpoints.
#[derive(Clone)]
pub struct ColorMetaStore {
    db: Arc<Database>,
}

impl ColorMetaStore {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let txn = db.begin_write()?;
        {
            txn.open_table(COLOR_IDS)?;
            txn.open_table(COLOR_DESCRIPTORS)?;
            txn.open_table(SCAN_HEIGHTS)?;
            txn.open_table(COUNTERS)?;
        }
        txn.commit()?;
        Ok(Self { db })
    }

    /// Return the id of `descriptor`, allocating a fresh one on first use.
    pub fn resolve_descriptor(&self, descriptor: &str) -> Result<ColorId> {
        if let Some(id) = self.find_color_id(descriptor)? {
            return Ok(id);
        }

        let txn = self.db.begin_write()?;
        let id = {
            let mut ids = txn.open_table(COLOR_IDS)?;
            // another writer may have won the race between our read and write
            let existing = ids.get(descriptor)?.map(|g| g.value());
            match existing {
                Some(id) => ColorId(id),
                None => {
                    let mut counters = txn.open_table(COUNTERS)?;
                    let next = counters.get(NEXT_COLOR_ID)?.map(|g| g.value()).unwrap_or(1);
                    counters.insert(NEXT_COLOR_ID, next + 1)?;
                    ids.insert(descriptor, next)?;
                    txn.open_table(COLOR_DESCRIPTORS)?.insert(next, descriptor)?;
                    log::debug!("registered color {} as {}", descriptor, next);
                    ColorId(next)
                }
            }
        };
        txn.commit()?;
        Ok(id)
    }

    /// Lookup without allocating.
    pub fn find_color_id(&self, descriptor: &str) -> Result<Option<ColorId>> {
        let txn = self.db.begin_read()?;
        let ids = txn.open_table(COLOR_IDS)?;
        Ok(ids.get(descriptor)?.map(|g| ColorId(g.value())))
    }

    pub fn find_descriptor(&self, color_id: ColorId) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let descs = txn.open_table(COLOR_DESCRIPTORS)?;
        Ok(descs.get(color_id.0)?.map(|g| g.value().to_string()))
    }

    pub fn get_scan_height(&self, color_id: ColorId) -> Result<Option<u32>> {
        Ok(self.get_checkpoint(color_id)?.map(|c| c.height))
    }

    pub fn get_checkpoint(&self, color_id: ColorId) -> Result<Option<Checkpoint>> {
        let txn = self.db.begin_read()?;
        let heights = txn.open_table(SCAN_HEIGHTS)?;
        let Some(guard) = heights.get(color_id.0)? else {
            return Ok(None);
        };
        let (height, hash) = guard.value();
        Ok(Some(Checkpoint {
            height,
            block_hash: decode_block_hash(hash)?,
        }))
    }

    pub fn set_scan_height(&self, color_id: ColorId, height: u32) -> Result<()> {
        let txn = self.db.begin_write()?;
        write_checkpoint(&txn, color_id, height, None)?;
        txn.commit()?;
        Ok(())
    }
}

pub(crate) fn write_checkpoint(
    txn: &WriteTransaction,
    color_id: ColorId,
    height: u32,
    block_hash: Option<BlockHash>,
) -> Result<()> {
    let mut heights = txn.open_table(SCAN_HEIGHTS)?;
    match block_hash {
        Some(hash) => {
            let bytes = hash.to_byte_array();
            heights.insert(color_id.0, (height, bytes.as_slice()))?;
        }
        None => {
            let empty: &[u8] = &[];
            heights.insert(color_id.0, (height, empty))?;
        }
    }
    Ok(())
}

fn decode_block_hash(bytes: &[u8]) -> Result<Option<BlockHash>> {
    if bytes.is_empty() {
        return Ok(None);
    }
    BlockHash::from_slice(bytes)
        .map(Some)
        .map_err(|_| Error::Corrupt(format!("block hash of {} bytes", bytes.len())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::in_memory_database;
    use redb::ReadableTableMetadata;

    const DESC_A: &str = "obc:b1fea52486ce0c62bb442b530a3f0132b826c74e473d1f2c220bfa78111c5082:0:46442";
    const DESC_B: &str = "obc:8f6c8751f39357cd42af97a67301127d497597ae699ad0670b4f649bd9e88f0a:0:46462";

    #[test]
    fn resolve_is_idempotent() {
        let store = ColorMetaStore::new(in_memory_database().unwrap()).unwrap();

        let a = store.resolve_descriptor(DESC_A).unwrap();
        let again = store.resolve_descriptor(DESC_A).unwrap();
        let b = store.resolve_descriptor(DESC_B).unwrap();

        assert_eq!(a, again);
        assert_ne!(a, b);
        assert!(a.0 > 0 && b.0 > 0);
        assert_eq!(store.find_descriptor(a).unwrap().as_deref(), Some(DESC_A));
        assert_eq!(store.find_descriptor(ColorId(99)).unwrap(), None);

        let txn = store.db.begin_read().unwrap();
        let ids = txn.open_table(COLOR_IDS).unwrap();
        assert_eq!(ids.len().unwrap(), 2);
    }

    #[test]
    fn scan_height_checkpoint() {
        let store = ColorMetaStore::new(in_memory_database().unwrap()).unwrap();
        let id = store.resolve_descriptor(DESC_A).unwrap();

        assert_eq!(store.get_scan_height(id).unwrap(), None);
        store.set_scan_height(id, 120).unwrap();
        assert_eq!(store.get_scan_height(id).unwrap(), Some(120));
        assert_eq!(store.get_checkpoint(id).unwrap().unwrap().block_hash, None);
    }

    #[test]
    fn ids_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("colors.redb");

        let id = {
            let store = ColorMetaStore::new(crate::store::open_database(&path).unwrap()).unwrap();
            store.resolve_descriptor(DESC_A).unwrap()
        };

        let store = ColorMetaStore::new(crate::store::open_database(&path).unwrap()).unwrap();
        assert_eq!(store.find_color_id(DESC_A).unwrap(), Some(id));
        assert_eq!(store.resolve_descriptor(DESC_B).unwrap(), ColorId(id.0 + 1));
    }
}
