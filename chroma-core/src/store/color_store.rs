use std::sync::Arc;

use bitcoin::{hashes::Hash, BlockHash, Txid};
use redb::{
    Database, MultimapTableDefinition, ReadableMultimapTable, ReadableTable, TableDefinition,
    WriteTransaction,
};

use crate::color::{ColorId, ColorValue};
use crate::error::Result;

use super::meta_store::write_checkpoint;
use super::txid_from_bytes;

/// (color id, txid, vout) -> (amount, label, height the record was written for)
const COLOR_VALUES: TableDefinition<(i64, &[u8], u32), (i64, &str, u32)> =
    TableDefinition::new("color_values");
/// (txid, vout) -> color ids with a record for that output
const COLORS_BY_OUTPOINT: MultimapTableDefinition<(&[u8], u32), i64> =
    MultimapTableDefinition::new("colors_by_outpoint");
/// (color id, txid, vout) -> height of the block whose scan consumed that colored output
const SPENT_OUTPUTS: TableDefinition<(i64, &[u8], u32), u32> =
    TableDefinition::new("spent_colored_outputs");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorRecord {
    pub txid: Txid,
    pub vout: u32,
    pub amount: i64,
    pub label: String,
    pub height: u32,
}

/// Cached kernel outputs, one record per colored output and color.
///
/// Absence of a record means "not scanned yet", not "zero".
#[derive(Clone)]
pub struct ColorStore {
    db: Arc<Database>,
}

impl ColorStore {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let txn = db.begin_write()?;
        {
            txn.open_table(COLOR_VALUES)?;
            txn.open_multimap_table(COLORS_BY_OUTPOINT)?;
            txn.open_table(SPENT_OUTPUTS)?;
        }
        txn.commit()?;
        Ok(Self { db })
    }

    /// Upsert a single record in its own commit.
    pub fn add(
        &self,
        color_id: ColorId,
        txid: &Txid,
        vout: u32,
        amount: i64,
        label: &str,
    ) -> Result<()> {
        let mut batch = self.begin_batch()?;
        batch.add(color_id, txid, vout, amount, label, 0)?;
        batch.commit()
    }

    pub fn remove(&self, color_id: ColorId, txid: &Txid, vout: u32) -> Result<()> {
        let mut batch = self.begin_batch()?;
        batch.remove(color_id, txid, vout)?;
        batch.commit()
    }

    pub fn get(&self, color_id: ColorId, txid: &Txid, vout: u32) -> Result<Option<(i64, String)>> {
        let txn = self.db.begin_read()?;
        let values = txn.open_table(COLOR_VALUES)?;
        let raw = txid.to_byte_array();
        Ok(values
            .get((color_id.0, raw.as_slice(), vout))?
            .map(|g| {
                let (amount, label, _) = g.value();
                (amount, label.to_string())
            }))
    }

    /// Every color value recorded for one output, across colors.
    pub fn get_any(&self, txid: &Txid, vout: u32) -> Result<Vec<ColorValue>> {
        let txn = self.db.begin_read()?;
        let values = txn.open_table(COLOR_VALUES)?;
        let index = txn.open_multimap_table(COLORS_BY_OUTPOINT)?;
        lookup_any(&values, &index, txid, vout)
    }

    pub fn get_all(&self, color_id: ColorId) -> Result<Vec<ColorRecord>> {
        let txn = self.db.begin_read()?;
        let values = txn.open_table(COLOR_VALUES)?;
        records_of(&values, color_id)
    }

    /// Records of `color_id` whose spend has not been scanned yet.
    pub fn get_unspent(&self, color_id: ColorId) -> Result<Vec<ColorRecord>> {
        let txn = self.db.begin_read()?;
        let values = txn.open_table(COLOR_VALUES)?;
        let spent = txn.open_table(SPENT_OUTPUTS)?;
        let mut res = Vec::new();
        for record in records_of(&values, color_id)? {
            let raw = record.txid.to_byte_array();
            if spent.get((color_id.0, raw.as_slice(), record.vout))?.is_none() {
                res.push(record);
            }
        }
        Ok(res)
    }

    /// Start a write batch; nothing in it is visible to readers before [`ColorBatch::commit`].
    pub fn begin_batch(&self) -> Result<ColorBatch> {
        Ok(ColorBatch {
            txn: self.db.begin_write()?,
        })
    }
}

fn lookup_any(
    values: &impl ReadableTable<(i64, &'static [u8], u32), (i64, &'static str, u32)>,
    index: &impl ReadableMultimapTable<(&'static [u8], u32), i64>,
    txid: &Txid,
    vout: u32,
) -> Result<Vec<ColorValue>> {
    let raw = txid.to_byte_array();
    let mut res = Vec::new();
    for color_id in index.get((raw.as_slice(), vout))? {
        let color_id = color_id?.value();
        if let Some(guard) = values.get((color_id, raw.as_slice(), vout))? {
            let (amount, label, _) = guard.value();
            res.push(ColorValue::with_label(ColorId(color_id), amount, label));
        }
    }
    Ok(res)
}

fn records_of(
    values: &impl ReadableTable<(i64, &'static [u8], u32), (i64, &'static str, u32)>,
    color_id: ColorId,
) -> Result<Vec<ColorRecord>> {
    let empty: &[u8] = &[];
    let mut res = Vec::new();
    for entry in values.range((color_id.0, empty, 0u32)..(color_id.0 + 1, empty, 0u32))? {
        let (key, value) = entry?;
        let (_, txid, vout) = key.value();
        let (amount, label, height) = value.value();
        res.push(ColorRecord {
            txid: txid_from_bytes(txid)?,
            vout,
            amount,
            label: label.to_string(),
            height,
        });
    }
    Ok(res)
}

/// One atomic unit of color index writes, typically one scanned block.
///
/// Reads through the batch see its own uncommitted writes, which is what lets
/// a transaction spending an output created earlier in the same block find
/// that output's color. Dropping the batch without committing discards it.
pub struct ColorBatch {
    txn: WriteTransaction,
}

impl ColorBatch {
    pub fn add(
        &mut self,
        color_id: ColorId,
        txid: &Txid,
        vout: u32,
        amount: i64,
        label: &str,
        height: u32,
    ) -> Result<()> {
        let raw = txid.to_byte_array();
        let mut values = self.txn.open_table(COLOR_VALUES)?;
        values.insert((color_id.0, raw.as_slice(), vout), (amount, label, height))?;
        let mut index = self.txn.open_multimap_table(COLORS_BY_OUTPOINT)?;
        index.insert((raw.as_slice(), vout), color_id.0)?;
        Ok(())
    }

    pub fn remove(&mut self, color_id: ColorId, txid: &Txid, vout: u32) -> Result<()> {
        let raw = txid.to_byte_array();
        let mut values = self.txn.open_table(COLOR_VALUES)?;
        values.remove((color_id.0, raw.as_slice(), vout))?;
        let mut index = self.txn.open_multimap_table(COLORS_BY_OUTPOINT)?;
        index.remove((raw.as_slice(), vout), color_id.0)?;
        let mut spent = self.txn.open_table(SPENT_OUTPUTS)?;
        spent.remove((color_id.0, raw.as_slice(), vout))?;
        Ok(())
    }

    /// Note that a transaction in block `height` consumed the colored output.
    pub fn mark_spent(
        &mut self,
        color_id: ColorId,
        txid: &Txid,
        vout: u32,
        height: u32,
    ) -> Result<()> {
        let raw = txid.to_byte_array();
        let mut spent = self.txn.open_table(SPENT_OUTPUTS)?;
        spent.insert((color_id.0, raw.as_slice(), vout), height)?;
        Ok(())
    }

    pub fn get_any(&self, txid: &Txid, vout: u32) -> Result<Vec<ColorValue>> {
        let values = self.txn.open_table(COLOR_VALUES)?;
        let index = self.txn.open_multimap_table(COLORS_BY_OUTPOINT)?;
        lookup_any(&values, &index, txid, vout)
    }

    /// Drop every record of `color_id` written for a height above `height`,
    /// and forget spends seen above it.
    pub fn truncate_above(&mut self, color_id: ColorId, height: u32) -> Result<usize> {
        let stale: Vec<ColorRecord> = {
            let values = self.txn.open_table(COLOR_VALUES)?;
            records_of(&values, color_id)?
                .into_iter()
                .filter(|r| r.height > height)
                .collect()
        };
        for record in &stale {
            self.remove(color_id, &record.txid, record.vout)?;
        }

        let empty: &[u8] = &[];
        let mut spent = self.txn.open_table(SPENT_OUTPUTS)?;
        let mut undone = Vec::new();
        for entry in spent.range((color_id.0, empty, 0u32)..(color_id.0 + 1, empty, 0u32))? {
            let (key, value) = entry?;
            if value.value() > height {
                let (_, txid, vout) = key.value();
                undone.push((txid.to_vec(), vout));
            }
        }
        for (txid, vout) in undone {
            spent.remove((color_id.0, txid.as_slice(), vout))?;
        }
        Ok(stale.len())
    }

    /// Record that `color_id` is complete up to `height`.
    pub fn set_scan_height(
        &mut self,
        color_id: ColorId,
        height: u32,
        block_hash: Option<BlockHash>,
    ) -> Result<()> {
        write_checkpoint(&self.txn, color_id, height, block_hash)
    }

    pub fn commit(self) -> Result<()> {
        self.txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{in_memory_database, ColorMetaStore};

    const RED: ColorId = ColorId(1);
    const BLUE: ColorId = ColorId(2);

    fn txid(n: u8) -> Txid {
        Txid::from_byte_array([n; 32])
    }

    fn store() -> ColorStore {
        ColorStore::new(in_memory_database().unwrap()).unwrap()
    }

    #[test]
    fn add_get_remove() {
        let store = store();
        store.add(RED, &txid(1), 0, 5_000, "").unwrap();
        store.add(RED, &txid(1), 1, 300, "change").unwrap();

        assert_eq!(
            store.get(RED, &txid(1), 1).unwrap(),
            Some((300, "change".to_string()))
        );
        assert_eq!(store.get(BLUE, &txid(1), 1).unwrap(), None);

        store.remove(RED, &txid(1), 1).unwrap();
        assert_eq!(store.get(RED, &txid(1), 1).unwrap(), None);
        assert!(store.get_any(&txid(1), 1).unwrap().is_empty());
    }

    #[test]
    fn add_is_upsert() {
        let store = store();
        store.add(RED, &txid(1), 0, 5_000, "").unwrap();
        store.add(RED, &txid(1), 0, 4_000, "again").unwrap();
        assert_eq!(
            store.get(RED, &txid(1), 0).unwrap(),
            Some((4_000, "again".to_string()))
        );
        assert_eq!(store.get_all(RED).unwrap().len(), 1);
    }

    #[test]
    fn get_any_spans_colors() {
        let store = store();
        store.add(RED, &txid(3), 2, 10, "").unwrap();
        store.add(BLUE, &txid(3), 2, 10, "").unwrap();
        store.add(BLUE, &txid(3), 3, 99, "").unwrap();

        let mut colors: Vec<ColorId> = store
            .get_any(&txid(3), 2)
            .unwrap()
            .iter()
            .map(|cv| cv.color_id())
            .collect();
        colors.sort();
        assert_eq!(colors, vec![RED, BLUE]);
    }

    #[test]
    fn get_all_is_per_color() {
        let store = store();
        store.add(RED, &txid(1), 0, 1, "").unwrap();
        store.add(BLUE, &txid(2), 0, 2, "").unwrap();
        store.add(RED, &txid(3), 4, 3, "").unwrap();

        let red: Vec<(Txid, u32)> = store
            .get_all(RED)
            .unwrap()
            .into_iter()
            .map(|r| (r.txid, r.vout))
            .collect();
        assert_eq!(red, vec![(txid(1), 0), (txid(3), 4)]);
    }

    #[test]
    fn batch_is_atomic_with_checkpoint() {
        let db = in_memory_database().unwrap();
        let store = ColorStore::new(db.clone()).unwrap();
        let meta = ColorMetaStore::new(db).unwrap();

        let mut batch = store.begin_batch().unwrap();
        batch.add(RED, &txid(1), 0, 50, "", 7).unwrap();
        assert_eq!(batch.get_any(&txid(1), 0).unwrap().len(), 1);
        batch.set_scan_height(RED, 7, None).unwrap();
        drop(batch);

        assert_eq!(meta.get_scan_height(RED).unwrap(), None);
        assert_eq!(store.get(RED, &txid(1), 0).unwrap(), None);

        let mut batch = store.begin_batch().unwrap();
        batch.add(RED, &txid(1), 0, 50, "", 7).unwrap();
        batch.set_scan_height(RED, 7, None).unwrap();
        batch.commit().unwrap();

        assert_eq!(meta.get_scan_height(RED).unwrap(), Some(7));
        assert_eq!(store.get(RED, &txid(1), 0).unwrap(), Some((50, String::new())));
    }

    #[test]
    fn truncate_drops_newer_records() {
        let store = store();
        let mut batch = store.begin_batch().unwrap();
        batch.add(RED, &txid(1), 0, 50, "", 10).unwrap();
        batch.add(RED, &txid(2), 0, 50, "", 11).unwrap();
        batch.add(BLUE, &txid(2), 1, 50, "", 12).unwrap();
        assert_eq!(batch.truncate_above(RED, 10).unwrap(), 1);
        batch.commit().unwrap();

        assert!(store.get(RED, &txid(1), 0).unwrap().is_some());
        assert!(store.get(RED, &txid(2), 0).unwrap().is_none());
        assert!(store.get(BLUE, &txid(2), 1).unwrap().is_some());
    }

    #[test]
    fn spends_hide_records_until_rolled_back() {
        let store = store();
        let mut batch = store.begin_batch().unwrap();
        batch.add(RED, &txid(1), 0, 50, "", 10).unwrap();
        batch.add(RED, &txid(2), 0, 30, "", 11).unwrap();
        batch.add(RED, &txid(2), 1, 20, "", 11).unwrap();
        batch.mark_spent(RED, &txid(1), 0, 11).unwrap();
        batch.mark_spent(RED, &txid(2), 0, 13).unwrap();
        batch.commit().unwrap();

        let unspent = |store: &ColorStore| -> Vec<(Txid, u32)> {
            store
                .get_unspent(RED)
                .unwrap()
                .into_iter()
                .map(|r| (r.txid, r.vout))
                .collect()
        };
        assert_eq!(unspent(&store), vec![(txid(2), 1)]);
        assert_eq!(store.get_all(RED).unwrap().len(), 3);

        let mut batch = store.begin_batch().unwrap();
        batch.truncate_above(RED, 12).unwrap();
        batch.commit().unwrap();
        assert_eq!(unspent(&store), vec![(txid(2), 0), (txid(2), 1)]);

        let mut batch = store.begin_batch().unwrap();
        batch.truncate_above(RED, 10).unwrap();
        batch.commit().unwrap();
        assert_eq!(unspent(&store), vec![(txid(1), 0)]);
    }
}
