use std::cmp::Ordering;

use bitcoin::FeeRate;

use crate::coins::{Coin, CoinQuery, CoinQueryParams};
use crate::color::{ColorId, ColorTarget, ColorValue};
use crate::error::{Error, Result};
use crate::keys::AddressBook;

/// What composition needs from the wallet.
pub trait OperationalTxSpec {
    fn get_targets(&self) -> &[ColorTarget];

    /// Coins of `value`'s color adding up to at least `value`, and their total.
    fn select_coins(&self, value: &ColorValue) -> Result<(Vec<Coin>, ColorValue)>;

    fn get_change_addr(&self, color_id: ColorId) -> Result<String>;

    /// Base-currency fee for a transaction of `tx_size` virtual bytes.
    fn get_required_fee(&self, tx_size: u64) -> Result<ColorValue>;
}

/// Operational spec backed by the wallet's coins and addresses.
pub struct WalletOperationalTxSpec<'a> {
    targets: Vec<ColorTarget>,
    query: CoinQuery<'a>,
    addresses: &'a AddressBook,
    fee_rate: FeeRate,
}

impl<'a> WalletOperationalTxSpec<'a> {
    pub fn new(
        targets: Vec<ColorTarget>,
        query: CoinQuery<'a>,
        addresses: &'a AddressBook,
        fee_rate: FeeRate,
    ) -> Self {
        Self {
            targets,
            query,
            addresses,
            fee_rate,
        }
    }
}

impl OperationalTxSpec for WalletOperationalTxSpec<'_> {
    fn get_targets(&self) -> &[ColorTarget] {
        &self.targets
    }

    fn select_coins(&self, value: &ColorValue) -> Result<(Vec<Coin>, ColorValue)> {
        if value.amount() == 0 {
            return Err(Error::ZeroSelect);
        }
        if value.amount() < 0 {
            return Err(Error::InvalidValue(format!("cannot select {}", value)));
        }

        let color_id = value.color_id();
        let candidates = self.query.get_result(
            &[color_id],
            self.addresses.addresses(color_id),
            CoinQueryParams::default(),
        )?;
        greedy_select(candidates, value)
    }

    fn get_change_addr(&self, color_id: ColorId) -> Result<String> {
        self.addresses.change_address(color_id)
    }

    fn get_required_fee(&self, tx_size: u64) -> Result<ColorValue> {
        let fee = self
            .fee_rate
            .fee_vb(tx_size)
            .ok_or_else(|| Error::InvalidValue(format!("fee for {} vbytes overflows", tx_size)))?;
        Ok(ColorValue::uncolored(fee.to_sat() as i64))
    }
}

/// Take coins in order until their value of `needed`'s color covers it.
pub(crate) fn greedy_select(
    candidates: Vec<Coin>,
    needed: &ColorValue,
) -> Result<(Vec<Coin>, ColorValue)> {
    let color_id = needed.color_id();
    let mut selected = Vec::new();
    let mut total = ColorValue::zero(color_id);

    for coin in candidates {
        let Some(colorvalue) = coin.colorvalue(color_id).cloned() else {
            continue;
        };
        total = total.try_add(&colorvalue)?;
        selected.push(coin);
        if total.try_cmp(needed)? != Ordering::Less {
            return Ok((selected, total));
        }
    }

    Err(Error::InsufficientFunds {
        needed: needed.amount(),
        available: total.amount(),
    })
}
