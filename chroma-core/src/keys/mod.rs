//! Keys and addresses the wallet spends from.

mod address_book;
mod keystore;

use bitcoin::{sighash::SegwitV0Sighash, Witness};

use crate::error::Result;

pub use address_book::AddressBook;
pub use keystore::KeyStore;

/// Produces spending witnesses for outputs of the addresses it holds keys for.
pub trait SigningProvider {
    fn owns(&self, address: &str) -> bool;

    /// Witness spending a P2WPKH output of `address`, committing to `sighash`
    /// with `SIGHASH_ALL`.
    fn sign_p2wpkh(&self, address: &str, sighash: SegwitV0Sighash) -> Result<Witness>;
}
