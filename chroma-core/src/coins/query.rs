use log::warn;

use crate::color::{ColorId, ColorValue};
use crate::colordata::ColorData;
use crate::config::{ChromaConfig, Verification};
use crate::error::Result;
use crate::keys::AddressBook;

use super::{Coin, CoinStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinQueryParams {
    /// `Some(true)` keeps only spent coins, `Some(false)` only unspent ones.
    pub spent: Option<bool>,
    pub only_unconfirmed: bool,
    pub include_unconfirmed: bool,
}

impl Default for CoinQueryParams {
    fn default() -> Self {
        Self {
            spent: Some(false),
            only_unconfirmed: false,
            include_unconfirmed: false,
        }
    }
}

/// Coins of a set of addresses holding a set of colors.
pub struct CoinQuery<'a> {
    coins: &'a CoinStore,
    color_data: &'a ColorData,
    addresses: &'a AddressBook,
    verification: Verification,
    min_confirmations: u32,
}

impl<'a> CoinQuery<'a> {
    pub fn new(
        coins: &'a CoinStore,
        color_data: &'a ColorData,
        addresses: &'a AddressBook,
        config: &ChromaConfig,
    ) -> Self {
        Self {
            coins,
            color_data,
            addresses,
            verification: config.verification,
            min_confirmations: config.min_confirmations,
        }
    }

    /// Coins at `addresses` passing `params` and carrying one of `color_ids`.
    ///
    /// Each returned coin has its color values restricted to `color_ids`.
    /// Coins of an address registered only for the base currency count as
    /// plain currency worth their output amount. Coins anywhere else get
    /// their values from the color index, and a coin whose values cannot be
    /// resolved is left out.
    pub fn get_result(
        &self,
        color_ids: &[ColorId],
        addresses: &[String],
        params: CoinQueryParams,
    ) -> Result<Vec<Coin>> {
        let wants_uncolored = color_ids.iter().any(ColorId::is_uncolored);
        let colored_ids: Vec<ColorId> = color_ids
            .iter()
            .copied()
            .filter(|id| !id.is_uncolored())
            .collect();

        let mut res = Vec::new();
        for address in addresses {
            let plain = self.addresses.is_uncolored_address(address);
            if (plain && !wants_uncolored) || (!plain && colored_ids.is_empty()) {
                continue;
            }

            for mut coin in self.coins.get_coins_for_address(address)? {
                if !self.passes(&coin, params)? {
                    continue;
                }

                if plain {
                    coin.colorvalues = vec![ColorValue::uncolored(coin.value.to_sat() as i64)];
                    res.push(coin);
                    continue;
                }

                let colorvalues = match self.color_data.get_colorvalues(
                    &colored_ids,
                    &coin.outpoint.txid,
                    coin.outpoint.vout,
                ) {
                    Ok(colorvalues) => colorvalues,
                    Err(e) => {
                        warn!("dropping coin {} at {}: {}", coin.id, coin.outpoint, e);
                        continue;
                    }
                };
                if !colorvalues.is_empty() {
                    coin.colorvalues = colorvalues;
                    res.push(coin);
                }
            }
        }
        Ok(res)
    }

    fn passes(&self, coin: &Coin, params: CoinQueryParams) -> Result<bool> {
        if let Some(spent) = params.spent {
            if self.coins.is_spent(coin.id)? != spent {
                return Ok(false);
            }
        }

        let confirmed = self
            .coins
            .is_confirmed(coin.id, self.verification, self.min_confirmations)?;
        if params.only_unconfirmed {
            return Ok(!confirmed);
        }
        Ok(confirmed || params.include_unconfirmed)
    }
}
