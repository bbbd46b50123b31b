use thiserror::Error;

use crate::color::ColorId;

#[derive(Debug, Error)]
pub enum Error {
    // Color values
    #[error("incompatible colors: {0} and {1}")]
    IncompatibleColor(ColorId, ColorId),
    #[error("invalid value: {0}")]
    InvalidValue(String),

    // Color definitions and lookups
    #[error("invalid color id {0}")]
    InvalidColorId(ColorId),
    #[error("invalid color descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("transaction {0} not found in any block")]
    TransactionNotFound(bitcoin::Txid),

    // Scanning
    #[error("cycle in same-block spend graph at height {0}")]
    GraphCyclic(u32),
    #[error("scan interrupted at height {0}")]
    Interrupted(u32),

    // Transaction construction
    #[error("cannot select coins for a zero value")]
    ZeroSelect,
    #[error("insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds { needed: i64, available: i64 },
    #[error("script verification failed for input {0}")]
    InvalidScript(usize),
    #[error("unsupported transform from {from} to {to}")]
    UnsupportedTransform {
        from: &'static str,
        to: &'static str,
    },
    #[error("no key for address {0}")]
    UnknownAddress(String),

    // Configuration
    #[error("configuration: {0}")]
    Config(String),

    // Persistence
    #[error("corrupt record: {0}")]
    Corrupt(String),

    // Wrapped external errors
    #[error(transparent)]
    Database(#[from] redb::DatabaseError),
    #[error(transparent)]
    Transaction(#[from] redb::TransactionError),
    #[error(transparent)]
    Table(#[from] redb::TableError),
    #[error(transparent)]
    Storage(#[from] redb::StorageError),
    #[error(transparent)]
    Commit(#[from] redb::CommitError),
    #[error(transparent)]
    Secp256k1(#[from] bitcoin::secp256k1::Error),
    #[error("sighash: {0}")]
    Sighash(String),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),

    // Address validation (string-wrapped, parse and network errors differ in type)
    #[error("address: {0}")]
    Address(String),

    // Chain client and spend index pass-through
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
