use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::store::ColorMetaStore;

use super::{ColorDefinition, ColorDescriptor, ColorId};

/// Resolves descriptors and ids to color definitions, caching definitions
/// once built.
pub struct ColorMap {
    meta: ColorMetaStore,
    cache: Mutex<HashMap<ColorId, Arc<ColorDefinition>>>,
}

impl ColorMap {
    pub fn new(meta: ColorMetaStore) -> Self {
        Self {
            meta,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn meta_store(&self) -> &ColorMetaStore {
        &self.meta
    }

    /// Id of `descriptor`. With `auto_add` an unknown descriptor is registered,
    /// otherwise `None` is returned for it. An empty descriptor is the base
    /// currency.
    pub fn resolve_color_desc(&self, descriptor: &str, auto_add: bool) -> Result<Option<ColorId>> {
        if descriptor.is_empty() {
            return Ok(Some(ColorId::UNCOLORED));
        }
        // spellings of the same genesis share one id
        let canonical = descriptor.parse::<ColorDescriptor>()?.to_string();
        if !auto_add {
            return self.meta.find_color_id(&canonical);
        }
        self.meta.resolve_descriptor(&canonical).map(Some)
    }

    pub fn find_color_desc(&self, color_id: ColorId) -> Result<Option<String>> {
        if color_id.is_uncolored() {
            return Ok(Some(String::new()));
        }
        self.meta.find_descriptor(color_id)
    }

    pub fn get_color_def(&self, color_id: ColorId) -> Result<Arc<ColorDefinition>> {
        if let Some(def) = self.lock_cache().get(&color_id) {
            return Ok(def.clone());
        }

        let descriptor = if color_id.is_uncolored() {
            String::new()
        } else {
            self.meta
                .find_descriptor(color_id)?
                .ok_or(Error::InvalidColorId(color_id))?
        };
        let def = Arc::new(ColorDefinition::from_descriptor(color_id, &descriptor)?);

        self.lock_cache().insert(color_id, def.clone());
        Ok(def)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<ColorId, Arc<ColorDefinition>>> {
        // the cache holds only immutable definitions, a poisoned lock is still usable
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}
