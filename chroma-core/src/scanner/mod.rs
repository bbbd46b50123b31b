//! Color data builders.
//!
//! A builder advances one color's scan height by running that color's kernel
//! over the transactions that can carry it. Two strategies exist:
//!
//! - [`FullScanBuilder`] walks every transaction of every block
//! - [`AidedBuilder`] follows the spend graph outward from the genesis output,
//!   using a [`SpendIndex`](crate::SpendIndex) to find spending transactions
//!
//! Both commit a block's color records and the checkpoint that covers them
//! together, so an interrupted or failed scan resumes from the last fully
//! written block.

mod aided;
mod full_scan;
mod logic;
mod manager;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::backend::SharedChain;
use crate::color::ColorId;
use crate::constants::DEFAULT_REORG_DEPTH;
use crate::error::Result;
use crate::store::{ColorMetaStore, ColorStore};

pub use aided::AidedBuilder;
pub use full_scan::FullScanBuilder;
pub use manager::{ColorDataBuilderManager, Strategy};

pub trait ColorDataBuilder: Send + Sync {
    fn color_id(&self) -> ColorId;

    /// Make sure every block up to and including `height` has been scanned
    /// for this color. Returns immediately when the checkpoint already covers
    /// `height`.
    fn ensure_scanned_upto(&self, height: u32) -> Result<()>;
}

/// Collaborators shared by every builder.
#[derive(Clone)]
pub struct ScanContext {
    pub chain: SharedChain,
    pub store: ColorStore,
    pub meta: ColorMetaStore,
    keep_scanning: Arc<AtomicBool>,
    reorg_depth: u32,
}

impl ScanContext {
    pub fn new(chain: SharedChain, store: ColorStore, meta: ColorMetaStore) -> Self {
        Self {
            chain,
            store,
            meta,
            keep_scanning: Arc::new(AtomicBool::new(true)),
            reorg_depth: DEFAULT_REORG_DEPTH,
        }
    }

    pub fn with_reorg_depth(mut self, reorg_depth: u32) -> Self {
        self.reorg_depth = reorg_depth;
        self
    }

    /// Share an externally owned flag; scanning stops at the next block
    /// boundary once it is cleared.
    pub fn with_keep_scanning(mut self, keep_scanning: Arc<AtomicBool>) -> Self {
        self.keep_scanning = keep_scanning;
        self
    }

    pub fn reorg_depth(&self) -> u32 {
        self.reorg_depth
    }

    pub fn stop(&self) {
        self.keep_scanning.store(false, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.keep_scanning.store(true, Ordering::Relaxed);
    }

    fn interrupt_requested(&self) -> bool {
        !self.keep_scanning.load(Ordering::Relaxed)
    }
}
