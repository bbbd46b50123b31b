use std::collections::BTreeSet;
use std::sync::Arc;

use bitcoin::{FeeRate, Txid};
use log::info;

use crate::backend::SharedChain;
use crate::coins::{CoinQuery, CoinStore};
use crate::color::{ColorDefinition, ColorDescriptor, ColorId, ColorMap, ColorTarget, ColorValue, Scheme};
use crate::colordata::ColorData;
use crate::config::ChromaConfig;
use crate::error::{Error, Result};
use crate::keys::{AddressBook, SigningProvider};
use crate::txspec::{
    self, BasicTxSpec, ComposedTxSpec, OperationalTxSpec, SignedTxSpec, TxSpec, TxSpecKind,
    WalletOperationalTxSpec,
};

pub type SharedSigner = Arc<dyn SigningProvider + Send + Sync>;

/// Turns payment intents into signed transactions and publishes them.
pub struct TxPipeline {
    config: ChromaConfig,
    fee_rate: FeeRate,
    chain: SharedChain,
    color_map: Arc<ColorMap>,
    color_data: Arc<ColorData>,
    coins: CoinStore,
    addresses: AddressBook,
    signer: SharedSigner,
}

impl TxPipeline {
    pub fn new(
        config: ChromaConfig,
        chain: SharedChain,
        color_map: Arc<ColorMap>,
        color_data: Arc<ColorData>,
        coins: CoinStore,
        addresses: AddressBook,
        signer: SharedSigner,
    ) -> Result<Self> {
        let fee_rate = FeeRate::from_sat_per_vb(config.fee_rate_sat_vb).ok_or_else(|| {
            Error::Config(format!("fee rate {} sat/vB overflows", config.fee_rate_sat_vb))
        })?;
        Ok(Self {
            config,
            fee_rate,
            chain,
            color_map,
            color_data,
            coins,
            addresses,
            signer,
        })
    }

    pub fn addresses(&self) -> &AddressBook {
        &self.addresses
    }

    pub fn addresses_mut(&mut self) -> &mut AddressBook {
        &mut self.addresses
    }

    pub fn coins(&self) -> &CoinStore {
        &self.coins
    }

    pub fn coin_query(&self) -> CoinQuery<'_> {
        CoinQuery::new(
            &self.coins,
            self.color_data.as_ref(),
            &self.addresses,
            &self.config,
        )
    }

    pub fn operational(&self, targets: Vec<ColorTarget>) -> WalletOperationalTxSpec<'_> {
        WalletOperationalTxSpec::new(targets, self.coin_query(), &self.addresses, self.fee_rate)
    }

    /// Advance `spec` to stage `target`, going through every stage in between.
    pub fn transform<'a>(&'a self, spec: TxSpec<'a>, target: TxSpecKind) -> Result<TxSpec<'a>> {
        let mut spec = spec;
        loop {
            let kind = spec.kind();
            if kind == target {
                return Ok(spec);
            }
            if target < kind {
                return Err(Error::UnsupportedTransform {
                    from: kind.name(),
                    to: target.name(),
                });
            }

            spec = match spec {
                TxSpec::Basic(basic) => TxSpec::Operational(self.make_operational(&basic)?),
                TxSpec::Operational(op) => TxSpec::Composed(self.compose(&op)?),
                TxSpec::Composed(composed) => TxSpec::Signed(self.sign(&composed)?),
                TxSpec::Signed(_) => {
                    return Err(Error::UnsupportedTransform {
                        from: kind.name(),
                        to: target.name(),
                    })
                }
            };
        }
    }

    /// Basic to signed in one call.
    pub fn make_signed(&self, basic: BasicTxSpec) -> Result<SignedTxSpec> {
        let signed = self.transform(TxSpec::Basic(basic), TxSpecKind::Signed)?;
        signed.into_signed().ok_or(Error::UnsupportedTransform {
            from: TxSpecKind::Basic.name(),
            to: TxSpecKind::Signed.name(),
        })
    }

    fn make_operational(&self, basic: &BasicTxSpec) -> Result<WalletOperationalTxSpec<'_>> {
        if !basic.is_monocolor() {
            return Err(Error::UnsupportedTransform {
                from: TxSpecKind::Basic.name(),
                to: TxSpecKind::Operational.name(),
            });
        }

        let mut targets = Vec::with_capacity(basic.targets().len());
        for target in basic.targets() {
            let descriptor = &target.asset.color_set()[0];
            let color_id = self
                .color_map
                .resolve_color_desc(descriptor, true)?
                .ok_or_else(|| Error::InvalidDescriptor(descriptor.clone()))?;
            targets.push(ColorTarget::new(
                target.address.clone(),
                ColorValue::new(color_id, target.amount),
            ));
        }
        Ok(self.operational(targets))
    }

    /// Lay out inputs and outputs with the composer of the one color paid.
    pub fn compose(&self, op: &dyn OperationalTxSpec) -> Result<ComposedTxSpec> {
        let colors: BTreeSet<ColorId> = op
            .get_targets()
            .iter()
            .map(ColorTarget::color_id)
            .filter(|id| !id.is_uncolored())
            .collect();

        let mut colors = colors.into_iter();
        match (colors.next(), colors.next()) {
            (None, _) => ColorDefinition::Uncolored.compose_tx_spec(op),
            (Some(ColorId::GENESIS), None) => {
                ColorDefinition::compose_genesis_tx_spec(Scheme::Obc, op)
            }
            (Some(color_id), None) => self.color_map.get_color_def(color_id)?.compose_tx_spec(op),
            (Some(_), Some(_)) => Err(Error::UnsupportedTransform {
                from: TxSpecKind::Operational.name(),
                to: TxSpecKind::Composed.name(),
            }),
        }
    }

    pub fn sign(&self, composed: &ComposedTxSpec) -> Result<SignedTxSpec> {
        txspec::sign(composed, self.signer.as_ref(), self.config.network)
    }

    /// Build and sign an issuance of `amount` units of a new color to `address`.
    ///
    /// The returned descriptor carries height 0; the issuance is not in a
    /// block yet.
    pub fn issue(&self, address: &str, amount: i64) -> Result<(SignedTxSpec, String)> {
        let op = self.operational(vec![ColorTarget::new(
            address,
            ColorValue::new(ColorId::GENESIS, amount),
        )]);
        let composed = self.compose(&op)?;
        let signed = self.sign(&composed)?;
        let descriptor = ColorDescriptor::new(Scheme::Obc, signed.txid(), 0, 0).to_string();
        info!("issuing {} units as {}", amount, descriptor);
        Ok((signed, descriptor))
    }

    /// Broadcast `signed` and record its effect on the wallet's coins.
    pub fn publish(&self, signed: &SignedTxSpec) -> Result<Txid> {
        let txid = self.chain.publish(signed.raw())?;
        self.coins.apply_tx(signed.transaction(), self.signer.as_ref())?;
        info!("published {}", txid);
        Ok(txid)
    }
}
