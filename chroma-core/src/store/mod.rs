//! Persistent color index.
//!
//! Color values and color metadata live in one [`redb`] database so that a
//! block's records and the checkpoint that covers them are written in the same
//! commit. Coins are kept in a separate database, see [`crate::coins`].
//!
//! redb allows a single write transaction at a time, which gives every
//! database the single-writer discipline the scanners rely on.

mod color_store;
mod meta_store;

use std::{path::Path, sync::Arc};

use bitcoin::{hashes::Hash, Txid};
use redb::{backends::InMemoryBackend, Database};

use crate::error::{Error, Result};

pub use color_store::{ColorBatch, ColorRecord, ColorStore};
pub use meta_store::{Checkpoint, ColorMetaStore};

/// Open (or create) a database file.
pub fn open_database(path: impl AsRef<Path>) -> Result<Arc<Database>> {
    Ok(Arc::new(Database::create(path)?))
}

/// A database that lives only as long as the process.
pub fn in_memory_database() -> Result<Arc<Database>> {
    let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
    Ok(Arc::new(db))
}

pub(crate) fn txid_from_bytes(bytes: &[u8]) -> Result<Txid> {
    Txid::from_slice(bytes).map_err(|_| Error::Corrupt(format!("txid of {} bytes", bytes.len())))
}
