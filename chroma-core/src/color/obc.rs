//! Order-based coloring.
//!
//! Color follows position in the value stream: inputs are laid out end to end
//! in input order, outputs likewise, and an output is colored when every
//! satoshi backing it comes from a colored input.

use bitcoin::{Amount, Transaction};

use crate::constants::{GENESIS_TX_SIZE_ESTIMATE, TX_SIZE_PER_INPUT};
use crate::error::{Error, Result};
use crate::txspec::{ComposedTxSpec, OperationalTxSpec};

use super::{select_uncolored_with_fee, ColorDescriptor, ColorId, ColorTarget, ColorValue, Genesis, Scheme};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObcDefinition {
    color_id: ColorId,
    genesis: Genesis,
    descriptor: String,
}

impl ObcDefinition {
    pub fn new(color_id: ColorId, genesis: Genesis) -> Self {
        let descriptor =
            ColorDescriptor::new(Scheme::Obc, genesis.txid, genesis.vout, genesis.height)
                .to_string();
        Self {
            color_id,
            genesis,
            descriptor,
        }
    }

    pub fn color_id(&self) -> ColorId {
        self.color_id
    }

    pub fn genesis(&self) -> &Genesis {
        &self.genesis
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn run_kernel(
        &self,
        tx: &Transaction,
        input_values: &[Amount],
        in_colorvalues: &[Option<ColorValue>],
    ) -> Vec<Option<ColorValue>> {
        let is_genesis = tx.compute_txid() == self.genesis.txid;

        let mut out_colorvalues = Vec::with_capacity(tx.output.len());
        let mut inp_index = 0;
        // input value consumed but not yet assigned to an output
        let mut cur_value: u64 = 0;
        let mut colored = false;

        for (out_index, output) in tx.output.iter().enumerate() {
            let out_value = output.value.to_sat();

            if cur_value == 0 {
                colored = true;
            }

            while cur_value < out_value {
                let Some(value) = input_values.get(inp_index) else {
                    // outputs exceed inputs, nothing backs the rest
                    colored = false;
                    break;
                };
                cur_value += value.to_sat();
                if !self.carries_color(in_colorvalues.get(inp_index)) {
                    colored = false;
                }
                inp_index += 1;
            }

            let is_genesis_output = is_genesis && out_index as u32 == self.genesis.vout;
            let colorvalue = if is_genesis_output || colored {
                Some(ColorValue::new(self.color_id, out_value as i64))
            } else {
                None
            };
            out_colorvalues.push(colorvalue);

            cur_value = cur_value.saturating_sub(out_value);
        }

        out_colorvalues
    }

    fn carries_color(&self, input: Option<&Option<ColorValue>>) -> bool {
        matches!(input, Some(Some(cv)) if cv.color_id() == self.color_id)
    }
}

/// Group targets by color, keeping first-appearance order.
fn group_targets(targets: &[ColorTarget]) -> Vec<(ColorId, Vec<&ColorTarget>)> {
    let mut groups: Vec<(ColorId, Vec<&ColorTarget>)> = Vec::new();
    for target in targets {
        match groups.iter_mut().find(|(id, _)| *id == target.color_id()) {
            Some((_, members)) => members.push(target),
            None => groups.push((target.color_id(), vec![target])),
        }
    }
    groups
}

pub(crate) fn compose_tx_spec(op: &dyn OperationalTxSpec) -> Result<ComposedTxSpec> {
    let targets = op.get_targets();

    let mut inputs = Vec::new();
    let mut colored_outputs: Vec<ColorTarget> = Vec::new();
    let mut uncolored_targets: Vec<ColorTarget> = Vec::new();

    for (color_id, members) in group_targets(targets) {
        if color_id.is_uncolored() {
            uncolored_targets.extend(members.into_iter().cloned());
            continue;
        }
        if color_id.is_genesis() {
            return Err(Error::InvalidColorId(color_id));
        }

        let needed = ColorValue::sum(color_id, members.iter().map(|t| &t.value))?;
        let (coins, total) = op.select_coins(&needed)?;
        inputs.extend(coins);
        colored_outputs.extend(members.into_iter().cloned());

        let change = total.try_sub(&needed)?;
        if change.amount() > 0 {
            colored_outputs.push(ColorTarget::new(op.get_change_addr(color_id)?, change));
        }
    }

    let uncolored_needed =
        ColorValue::sum(ColorId::UNCOLORED, uncolored_targets.iter().map(|t| &t.value))?;
    let selection = select_uncolored_with_fee(op, &uncolored_needed, inputs.len(), TX_SIZE_PER_INPUT)?;
    inputs.extend(selection.coins);

    let change = selection.total.try_sub(&selection.needed)?;
    let mut outputs = colored_outputs;
    outputs.extend(uncolored_targets);
    if change.amount() > 0 {
        outputs.push(ColorTarget::new(
            op.get_change_addr(ColorId::UNCOLORED)?,
            change,
        ));
    }

    ComposedTxSpec::from_targets(inputs, &outputs)
}

pub(crate) fn compose_genesis_tx_spec(op: &dyn OperationalTxSpec) -> Result<ComposedTxSpec> {
    let [target] = op.get_targets() else {
        return Err(Error::InvalidValue(format!(
            "genesis transaction takes exactly one target, got {}",
            op.get_targets().len()
        )));
    };
    if !target.color_id().is_genesis() {
        return Err(Error::InvalidColorId(target.color_id()));
    }

    let fee = op.get_required_fee(GENESIS_TX_SIZE_ESTIMATE)?;
    let needed = ColorValue::uncolored(target.amount()).try_add(&fee)?;
    let (inputs, total) = op.select_coins(&needed)?;

    let mut outputs = vec![ColorTarget::new(
        target.address.clone(),
        ColorValue::uncolored(target.amount()),
    )];
    let change = total.try_sub(&needed)?;
    if change.amount() > 0 {
        outputs.push(ColorTarget::new(
            op.get_change_addr(ColorId::UNCOLORED)?,
            change,
        ));
    }

    ComposedTxSpec::from_targets(inputs, &outputs)
}
