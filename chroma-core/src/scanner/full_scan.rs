use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::{debug, info};

use crate::color::{ColorDefinition, ColorId};
use crate::error::{Error, Result};

use super::{logic, ColorDataBuilder, ScanContext};

/// Scans every transaction of every block from the color's genesis height on.
pub struct FullScanBuilder {
    def: Arc<ColorDefinition>,
    ctx: ScanContext,
    scan_lock: Mutex<()>,
}

impl FullScanBuilder {
    pub fn new(def: Arc<ColorDefinition>, ctx: ScanContext) -> Self {
        Self {
            def,
            ctx,
            scan_lock: Mutex::new(()),
        }
    }

    fn scan_block(&self, blkheight: u32) -> Result<()> {
        let color_id = self.def.color_id();
        let txs = self.ctx.chain.iterate_block_transactions(blkheight)?;
        let blkhash = self.ctx.chain.get_block_hash(blkheight)?;

        let mut batch = self.ctx.store.begin_batch()?;
        let mut relevant = 0;
        for tx in &txs {
            if logic::scan_tx(&self.def, self.ctx.chain.as_ref(), &mut batch, tx, blkheight)? {
                relevant += 1;
            }
        }
        batch.set_scan_height(color_id, blkheight, Some(blkhash))?;
        batch.commit()?;

        debug!(
            "color {}: block {} scanned, {} of {} transactions relevant",
            color_id,
            blkheight,
            relevant,
            txs.len()
        );
        Ok(())
    }
}

impl ColorDataBuilder for FullScanBuilder {
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

        let scanned = logic::checked_scan_height(&self.ctx, color_id)?;
        let start = logic::first_unscanned_height(&self.def, scanned);
        if start > height {
            return Ok(());
        }

        info!("color {}: full scan {}..={}", color_id, start, height);
        let start_time = Instant::now();

        for blkheight in start..=height {
            if self.ctx.interrupt_requested() {
                info!("color {}: scan interrupted before block {}", color_id, blkheight);
                return Err(Error::Interrupted(blkheight));
            }
            self.scan_block(blkheight)?;
        }

        info!(
            "color {}: full scan complete in {} seconds",
            color_id,
            start_time.elapsed().as_secs()
        );
        Ok(())
    }
}
