use std::fmt;
use std::str::FromStr;

use bitcoin::{Amount, Transaction, Txid};

use crate::error::{Error, Result};
use crate::txspec::{ComposedTxSpec, OperationalTxSpec};

use super::{obc, uncolored, ColorId, ColorValue};

/// Where a color was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Genesis {
    pub txid: Txid,
    pub vout: u32,
    pub height: u32,
}

/// Coloring scheme of a descriptor, the part before the first `:`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Obc,
}

impl Scheme {
    pub fn code(&self) -> &'static str {
        match self {
            Scheme::Obc => "obc",
        }
    }
}

impl FromStr for Scheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "obc" => Ok(Scheme::Obc),
            other => Err(Error::InvalidDescriptor(format!("unknown scheme {other}"))),
        }
    }
}

/// Parsed form of `scheme:genesis_txid:genesis_vout:genesis_height`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorDescriptor {
    pub scheme: Scheme,
    pub genesis: Genesis,
}

impl ColorDescriptor {
    pub fn new(scheme: Scheme, txid: Txid, vout: u32, height: u32) -> Self {
        Self {
            scheme,
            genesis: Genesis { txid, vout, height },
        }
    }
}

impl FromStr for ColorDescriptor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidDescriptor(s.to_string());

        let parts: Vec<&str> = s.split(':').collect();
        let [scheme, txid, vout, height] = parts.as_slice() else {
            return Err(invalid());
        };

        Ok(Self {
            scheme: scheme.parse()?,
            genesis: Genesis {
                txid: txid.parse().map_err(|_| invalid())?,
                vout: vout.parse().map_err(|_| invalid())?,
                height: height.parse().map_err(|_| invalid())?,
            },
        })
    }
}

impl fmt::Display for ColorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.scheme.code(),
            self.genesis.txid,
            self.genesis.vout,
            self.genesis.height
        )
    }
}

/// A coloring rule bound to one color id.
///
/// Schemes form a closed set; adding one means a new variant and new match
/// arms here, never a runtime registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorDefinition {
    Uncolored,
    Obc(obc::ObcDefinition),
}

impl ColorDefinition {
    pub fn from_descriptor(color_id: ColorId, descriptor: &str) -> Result<Self> {
        if color_id.is_uncolored() {
            return Ok(ColorDefinition::Uncolored);
        }
        if color_id.is_genesis() {
            return Err(Error::InvalidColorId(color_id));
        }

        let desc: ColorDescriptor = descriptor.parse()?;
        match desc.scheme {
            Scheme::Obc => Ok(ColorDefinition::Obc(obc::ObcDefinition::new(
                color_id,
                desc.genesis,
            ))),
        }
    }

    pub fn color_id(&self) -> ColorId {
        match self {
            ColorDefinition::Uncolored => ColorId::UNCOLORED,
            ColorDefinition::Obc(def) => def.color_id(),
        }
    }

    pub fn genesis(&self) -> Option<&Genesis> {
        match self {
            ColorDefinition::Uncolored => None,
            ColorDefinition::Obc(def) => Some(def.genesis()),
        }
    }

    /// Descriptor string, empty for the base currency.
    pub fn descriptor(&self) -> String {
        match self {
            ColorDefinition::Uncolored => String::new(),
            ColorDefinition::Obc(def) => def.descriptor().to_string(),
        }
    }

    /// Transactions the scanner must run the kernel on even when none of
    /// their inputs carry this color.
    pub fn is_special_tx(&self, txid: &Txid) -> bool {
        self.genesis().is_some_and(|g| &g.txid == txid)
    }

    /// Compute this color's value for every output of `tx`.
    ///
    /// `input_values` are the resolved amounts of the spent outputs, in input
    /// order; `in_colorvalues` are the cached color values of those outputs.
    pub fn run_kernel(
        &self,
        tx: &Transaction,
        input_values: &[Amount],
        in_colorvalues: &[Option<ColorValue>],
    ) -> Vec<Option<ColorValue>> {
        match self {
            ColorDefinition::Uncolored => vec![None; tx.output.len()],
            ColorDefinition::Obc(def) => def.run_kernel(tx, input_values, in_colorvalues),
        }
    }

    pub fn compose_tx_spec(&self, op: &dyn OperationalTxSpec) -> Result<ComposedTxSpec> {
        match self {
            ColorDefinition::Uncolored => uncolored::compose_tx_spec(op),
            ColorDefinition::Obc(_) => obc::compose_tx_spec(op),
        }
    }

    /// Compose an issuance transaction for a color that does not exist yet.
    pub fn compose_genesis_tx_spec(
        scheme: Scheme,
        op: &dyn OperationalTxSpec,
    ) -> Result<ComposedTxSpec> {
        match scheme {
            Scheme::Obc => obc::compose_genesis_tx_spec(op),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TXID: &str = "b1fea52486ce0c62bb442b530a3f0132b826c74e473d1f2c220bfa78111c5082";

    #[test]
    fn descriptor_round_trip() {
        let text = format!("obc:{TXID}:0:46442");
        let desc: ColorDescriptor = text.parse().unwrap();
        assert_eq!(desc.scheme, Scheme::Obc);
        assert_eq!(desc.genesis.vout, 0);
        assert_eq!(desc.genesis.height, 46442);
        assert_eq!(desc.to_string(), text);
    }

    #[test]
    fn bad_descriptors() {
        let cases = vec![
            "obc".to_string(),
            "epobc:abc:0:1".to_string(),
            format!("xyz:{TXID}:0:1"),
            format!("obc:{TXID}:zero:1"),
            format!("obc:{TXID}:0:1:2"),
        ];
        for bad in &cases {
            assert!(
                matches!(bad.parse::<ColorDescriptor>(), Err(Error::InvalidDescriptor(_))),
                "{bad} should not parse"
            );
        }
    }

    #[test]
    fn reserved_ids() {
        let desc = format!("obc:{TXID}:0:1");
        assert_eq!(
            ColorDefinition::from_descriptor(ColorId::UNCOLORED, "").unwrap(),
            ColorDefinition::Uncolored
        );
        assert!(matches!(
            ColorDefinition::from_descriptor(ColorId::GENESIS, &desc),
            Err(Error::InvalidColorId(ColorId::GENESIS))
        ));

        let def = ColorDefinition::from_descriptor(ColorId(3), &desc).unwrap();
        assert_eq!(def.color_id(), ColorId(3));
        assert_eq!(def.descriptor(), desc);
        assert!(def.is_special_tx(&TXID.parse().unwrap()));
    }
}
