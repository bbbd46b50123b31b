//! Transactions under construction.
//!
//! A payment moves through four stages, each produced from the previous one
//! by [`TxPipeline::transform`](crate::TxPipeline::transform):
//!
//! 1. [`BasicTxSpec`] - what to pay, in assets
//! 2. [`OperationalTxSpec`] - targets resolved to colors, with access to coins,
//!    change addresses and fee estimation
//! 3. [`ComposedTxSpec`] - concrete inputs and outputs, unsigned
//! 4. [`SignedTxSpec`] - signed and serialized
//!
//! Stages only move forward.

mod basic;
mod composed;
mod operational;
mod signed;

pub use basic::{AssetDefinition, BasicTarget, BasicTxSpec};
pub use composed::{ComposedOutput, ComposedTxSpec};
pub use operational::{OperationalTxSpec, WalletOperationalTxSpec};
pub use signed::SignedTxSpec;

pub(crate) use signed::sign;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TxSpecKind {
    Basic,
    Operational,
    Composed,
    Signed,
}

impl TxSpecKind {
    pub fn name(&self) -> &'static str {
        match self {
            TxSpecKind::Basic => "basic",
            TxSpecKind::Operational => "operational",
            TxSpecKind::Composed => "composed",
            TxSpecKind::Signed => "signed",
        }
    }
}

pub enum TxSpec<'a> {
    Basic(BasicTxSpec),
    Operational(WalletOperationalTxSpec<'a>),
    Composed(ComposedTxSpec),
    Signed(SignedTxSpec),
}

impl TxSpec<'_> {
    pub fn kind(&self) -> TxSpecKind {
        match self {
            TxSpec::Basic(_) => TxSpecKind::Basic,
            TxSpec::Operational(_) => TxSpecKind::Operational,
            TxSpec::Composed(_) => TxSpecKind::Composed,
            TxSpec::Signed(_) => TxSpecKind::Signed,
        }
    }

    pub fn into_composed(self) -> Option<ComposedTxSpec> {
        match self {
            TxSpec::Composed(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn into_signed(self) -> Option<SignedTxSpec> {
        match self {
            TxSpec::Signed(spec) => Some(spec),
            _ => None,
        }
    }
}
