use bitcoin::{
    absolute::LockTime, transaction::Version, Amount, Network, ScriptBuf, Sequence, Transaction,
    TxIn, TxOut, Witness,
};

use crate::coins::{checked_address, Coin};
use crate::color::ColorTarget;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedOutput {
    pub address: String,
    pub value: Amount,
}

/// Unsigned transaction skeleton: the coins to spend and the outputs to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedTxSpec {
    inputs: Vec<Coin>,
    outputs: Vec<ComposedOutput>,
}

impl ComposedTxSpec {
    pub fn new(inputs: Vec<Coin>, outputs: Vec<ComposedOutput>) -> Self {
        Self { inputs, outputs }
    }

    /// Outputs in target order, each worth its target's amount in satoshis.
    pub fn from_targets(inputs: Vec<Coin>, targets: &[ColorTarget]) -> Result<Self> {
        let outputs = targets
            .iter()
            .map(|target| {
                let sats = u64::try_from(target.amount()).map_err(|_| {
                    Error::InvalidValue(format!("negative output {}", target.value))
                })?;
                Ok(ComposedOutput {
                    address: target.address.clone(),
                    value: Amount::from_sat(sats),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { inputs, outputs })
    }

    pub fn inputs(&self) -> &[Coin] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ComposedOutput] {
        &self.outputs
    }

    pub fn input_value(&self) -> Amount {
        self.inputs.iter().map(|c| c.value).sum()
    }

    pub fn output_value(&self) -> Amount {
        self.outputs.iter().map(|o| o.value).sum()
    }

    /// What the inputs leave to miners.
    pub fn fee(&self) -> Result<Amount> {
        self.input_value()
            .checked_sub(self.output_value())
            .ok_or_else(|| Error::InvalidValue("outputs exceed inputs".to_string()))
    }

    pub fn to_unsigned_tx(&self, network: Network) -> Result<Transaction> {
        let output = self
            .outputs
            .iter()
            .map(|o| {
                Ok(TxOut {
                    value: o.value,
                    script_pubkey: checked_address(&o.address, network)?.script_pubkey(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let input = self
            .inputs
            .iter()
            .map(|coin| TxIn {
                previous_output: coin.outpoint,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                witness: Witness::new(),
            })
            .collect();

        Ok(Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input,
            output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{ColorId, ColorValue};

    #[test]
    fn negative_targets_are_rejected() {
        let targets = vec![ColorTarget::new("a", ColorValue::new(ColorId(1), -5))];
        assert!(matches!(
            ComposedTxSpec::from_targets(vec![], &targets),
            Err(Error::InvalidValue(_))
        ));
    }

    #[test]
    fn fee_needs_enough_inputs() {
        let targets = vec![ColorTarget::new("a", ColorValue::uncolored(10))];
        let spec = ComposedTxSpec::from_targets(vec![], &targets).unwrap();
        assert_eq!(spec.output_value(), Amount::from_sat(10));
        assert!(spec.fee().is_err());
    }
}
