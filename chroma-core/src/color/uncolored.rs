use crate::constants::TX_SIZE_PER_INPUT;
use crate::error::{Error, Result};
use crate::txspec::{ComposedTxSpec, OperationalTxSpec};

use super::{select_uncolored_with_fee, ColorId, ColorTarget, ColorValue};

/// Plain payment: every target is base currency, one pool pays targets and fee.
pub(crate) fn compose_tx_spec(op: &dyn OperationalTxSpec) -> Result<ComposedTxSpec> {
    let targets = op.get_targets();
    if let Some(colored) = targets.iter().find(|t| !t.color_id().is_uncolored()) {
        return Err(Error::IncompatibleColor(ColorId::UNCOLORED, colored.color_id()));
    }

    let needed = ColorValue::sum(ColorId::UNCOLORED, targets.iter().map(|t| &t.value))?;
    let selection = select_uncolored_with_fee(op, &needed, 0, TX_SIZE_PER_INPUT)?;

    let mut outputs: Vec<ColorTarget> = targets.to_vec();
    let change = selection.total.try_sub(&selection.needed)?;
    if change.amount() > 0 {
        outputs.push(ColorTarget::new(
            op.get_change_addr(ColorId::UNCOLORED)?,
            change,
        ));
    }

    ComposedTxSpec::from_targets(selection.coins, &outputs)
}
