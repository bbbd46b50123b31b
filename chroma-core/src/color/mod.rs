//! Colors, color values and the coloring kernels.
//!
//! ## Core Types
//!
//! - [`ColorId`] / [`ColorValue`] - typed amounts whose arithmetic refuses to mix colors
//! - [`ColorDefinition`] - a coloring rule bound to one color, dispatching to its kernel
//! - [`ColorMap`] - cache resolving descriptors and ids to definitions
//!
//! The order-based kernel lives in [`obc`]. Composition of unsigned
//! transactions is driven from here as well, since how inputs and outputs
//! are laid out is what decides where color ends up.

mod definition;
mod map;
pub mod obc;
mod uncolored;
mod value;

pub use definition::{ColorDefinition, ColorDescriptor, Genesis, Scheme};
pub use map::ColorMap;
pub use value::{ColorId, ColorTarget, ColorValue};

use crate::coins::Coin;
use crate::error::Result;
use crate::txspec::OperationalTxSpec;

pub(crate) struct FeeSelection {
    pub coins: Vec<Coin>,
    pub total: ColorValue,
    /// requested amount plus the fee for the final input count
    pub needed: ColorValue,
}

/// Select base-currency coins for `needed` plus a fee sized by input count.
///
/// The fee depends on how many inputs the transaction ends up with, which
/// depends on the fee. Selection is repeated with the updated count until
/// it stops growing; greedy selection only ever takes a longer prefix, so
/// this terminates.
pub(crate) fn select_uncolored_with_fee(
    op: &dyn OperationalTxSpec,
    needed: &ColorValue,
    other_inputs: usize,
    bytes_per_input: u64,
) -> Result<FeeSelection> {
    let mut n_inputs = other_inputs + 1;
    loop {
        let fee = op.get_required_fee(bytes_per_input * n_inputs as u64)?;
        let needed_with_fee = needed.try_add(&fee)?;
        if needed_with_fee.amount() == 0 {
            return Ok(FeeSelection {
                coins: Vec::new(),
                total: ColorValue::zero(ColorId::UNCOLORED),
                needed: needed_with_fee,
            });
        }

        let (coins, total) = op.select_coins(&needed_with_fee)?;
        let actual = other_inputs + coins.len();
        if actual <= n_inputs {
            return Ok(FeeSelection {
                coins,
                total,
                needed: needed_with_fee,
            });
        }
        n_inputs = actual;
    }
}
