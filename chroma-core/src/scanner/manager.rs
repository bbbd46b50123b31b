use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::backend::SharedSpendIndex;
use crate::color::{ColorId, ColorMap};
use crate::config::{BuilderKind, ChromaConfig};
use crate::error::{Error, Result};

use super::{AidedBuilder, ColorDataBuilder, FullScanBuilder, ScanContext};

/// Builder strategy, with what it needs beyond the shared [`ScanContext`].
#[derive(Clone)]
pub enum Strategy {
    FullScan,
    Aided(SharedSpendIndex),
}

impl Strategy {
    pub fn from_config(config: &ChromaConfig, spends: Option<SharedSpendIndex>) -> Result<Self> {
        match (config.builder, spends) {
            (BuilderKind::FullScan, _) => Ok(Strategy::FullScan),
            (BuilderKind::Aided, Some(spends)) => Ok(Strategy::Aided(spends)),
            (BuilderKind::Aided, None) => Err(Error::Config(
                "aided builder configured without a spend index".to_string(),
            )),
        }
    }
}

/// One builder per color, created on first use.
pub struct ColorDataBuilderManager {
    strategy: Strategy,
    ctx: ScanContext,
    color_map: Arc<ColorMap>,
    builders: Mutex<HashMap<ColorId, Arc<dyn ColorDataBuilder>>>,
}

impl ColorDataBuilderManager {
    pub fn new(strategy: Strategy, ctx: ScanContext, color_map: Arc<ColorMap>) -> Self {
        Self {
            strategy,
            ctx,
            color_map,
            builders: Mutex::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &ScanContext {
        &self.ctx
    }

    /// Stop running scans at their next block boundary.
    pub fn stop(&self) {
        self.ctx.stop();
    }

    pub fn resume(&self) {
        self.ctx.resume();
    }

    /// The builder for `color_id`. The base currency has none.
    pub fn get_builder(&self, color_id: ColorId) -> Result<Arc<dyn ColorDataBuilder>> {
        if color_id.is_uncolored() || color_id.is_genesis() {
            return Err(Error::InvalidColorId(color_id));
        }

        let mut builders = self.builders.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(builder) = builders.get(&color_id) {
            return Ok(builder.clone());
        }

        let def = self.color_map.get_color_def(color_id)?;
        let builder: Arc<dyn ColorDataBuilder> = match &self.strategy {
            Strategy::FullScan => Arc::new(FullScanBuilder::new(def, self.ctx.clone())),
            Strategy::Aided(spends) => {
                Arc::new(AidedBuilder::new(def, self.ctx.clone(), spends.clone()))
            }
        };
        builders.insert(color_id, builder.clone());
        Ok(builder)
    }

    /// Bring every color of `color_ids` up to `height`, skipping the base currency.
    pub fn ensure_scanned_upto(&self, color_ids: &[ColorId], height: u32) -> Result<()> {
        let builders = color_ids
            .iter()
            .filter(|id| !id.is_uncolored())
            .map(|id| self.get_builder(*id))
            .collect::<Result<Vec<_>>>()?;

        // Colors are independent; each builder serializes its own scans
        #[cfg(all(not(target_arch = "wasm32"), feature = "parallel"))]
        {
            use rayon::prelude::*;
            builders
                .par_iter()
                .try_for_each(|builder| builder.ensure_scanned_upto(height))
        }

        #[cfg(not(all(not(target_arch = "wasm32"), feature = "parallel")))]
        {
            builders
                .iter()
                .try_for_each(|builder| builder.ensure_scanned_upto(height))
        }
    }
}
