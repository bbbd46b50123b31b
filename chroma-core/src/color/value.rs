use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Handle of a registered color.
///
/// Ids are allocated by the meta store the first time a descriptor is
/// resolved and are never reused. Two values are reserved: [`ColorId::UNCOLORED`]
/// for the base currency and [`ColorId::GENESIS`], which only appears on the
/// single target of an issuance transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColorId(pub i64);

impl ColorId {
    pub const UNCOLORED: ColorId = ColorId(0);
    pub const GENESIS: ColorId = ColorId(-1);

    pub fn is_uncolored(&self) -> bool {
        *self == Self::UNCOLORED
    }

    pub fn is_genesis(&self) -> bool {
        *self == Self::GENESIS
    }
}

impl fmt::Display for ColorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An amount of one specific color.
///
/// Arithmetic and ordering are only defined between values of the same color;
/// mixing colors fails with [`Error::IncompatibleColor`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorValue {
    color_id: ColorId,
    amount: i64,
    label: String,
}

impl ColorValue {
    pub fn new(color_id: ColorId, amount: i64) -> Self {
        Self {
            color_id,
            amount,
            label: String::new(),
        }
    }

    pub fn with_label(color_id: ColorId, amount: i64, label: impl Into<String>) -> Self {
        Self {
            color_id,
            amount,
            label: label.into(),
        }
    }

    /// A base-currency amount, in satoshis.
    pub fn uncolored(amount: i64) -> Self {
        Self::new(ColorId::UNCOLORED, amount)
    }

    pub fn zero(color_id: ColorId) -> Self {
        Self::new(color_id, 0)
    }

    /// Parse a user-supplied amount. Fractional or malformed input is rejected.
    pub fn parse(color_id: ColorId, text: &str) -> Result<Self> {
        let text = text.trim();
        let invalid = || Error::InvalidValue(text.to_string());

        let amount = match text.split_once('.') {
            None => text.parse::<i64>().map_err(|_| invalid())?,
            Some((whole, frac)) => {
                if frac.is_empty() || !frac.bytes().all(|b| b == b'0') {
                    return Err(invalid());
                }
                whole.parse::<i64>().map_err(|_| invalid())?
            }
        };

        Ok(Self::new(color_id, amount))
    }

    pub fn color_id(&self) -> ColorId {
        self.color_id
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_uncolored(&self) -> bool {
        self.color_id.is_uncolored()
    }

    fn check_compatible(&self, other: &ColorValue) -> Result<()> {
        if self.color_id != other.color_id {
            return Err(Error::IncompatibleColor(self.color_id, other.color_id));
        }
        Ok(())
    }

    pub fn try_add(&self, other: &ColorValue) -> Result<ColorValue> {
        self.check_compatible(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or_else(|| Error::InvalidValue(format!("{} + {} overflows", self.amount, other.amount)))?;
        Ok(Self::with_label(self.color_id, amount, self.label.clone()))
    }

    pub fn try_sub(&self, other: &ColorValue) -> Result<ColorValue> {
        self.check_compatible(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or_else(|| Error::InvalidValue(format!("{} - {} overflows", self.amount, other.amount)))?;
        Ok(Self::with_label(self.color_id, amount, self.label.clone()))
    }

    pub fn try_cmp(&self, other: &ColorValue) -> Result<Ordering> {
        self.check_compatible(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    /// Sum values of `color_id`, starting from zero. Any value of another
    /// color is an error.
    pub fn sum<'a, I>(color_id: ColorId, values: I) -> Result<ColorValue>
    where
        I: IntoIterator<Item = &'a ColorValue>,
    {
        values
            .into_iter()
            .try_fold(ColorValue::zero(color_id), |acc, v| acc.try_add(v))
    }
}

impl fmt::Display for ColorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.label.is_empty() {
            write!(f, "{}@{}", self.amount, self.color_id)
        } else {
            write!(f, "{}@{} ({})", self.amount, self.color_id, self.label)
        }
    }
}

/// A payment of `value` to `address`, once the asset has been resolved to a color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorTarget {
    pub address: String,
    pub value: ColorValue,
}

impl ColorTarget {
    pub fn new(address: impl Into<String>, value: ColorValue) -> Self {
        Self {
            address: address.into(),
            value,
        }
    }

    pub fn color_id(&self) -> ColorId {
        self.value.color_id()
    }

    pub fn amount(&self) -> i64 {
        self.value.amount()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: ColorId = ColorId(1);
    const BLUE: ColorId = ColorId(2);

    #[test]
    fn add_then_sub_is_identity() {
        let a = ColorValue::new(RED, 700);
        let b = ColorValue::new(RED, 42);
        let back = a.try_add(&b).unwrap().try_sub(&b).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn mixing_colors_fails() {
        let a = ColorValue::new(RED, 1);
        let b = ColorValue::new(BLUE, 1);
        assert!(matches!(
            a.try_add(&b),
            Err(Error::IncompatibleColor(RED, BLUE))
        ));
        assert!(matches!(a.try_sub(&b), Err(Error::IncompatibleColor(..))));
        assert!(matches!(a.try_cmp(&b), Err(Error::IncompatibleColor(..))));
    }

    #[test]
    fn compare_same_color() {
        let small = ColorValue::new(RED, 5);
        let big = ColorValue::new(RED, 9);
        assert_eq!(small.try_cmp(&big).unwrap(), Ordering::Less);
        assert_eq!(big.try_cmp(&small).unwrap(), Ordering::Greater);
        assert_eq!(big.try_cmp(&big.clone()).unwrap(), Ordering::Equal);
    }

    #[test]
    fn sum_folds_and_keeps_color() {
        let values = vec![
            ColorValue::new(RED, 1),
            ColorValue::new(RED, 2),
            ColorValue::new(RED, 3),
        ];
        let total = ColorValue::sum(RED, &values).unwrap();
        assert_eq!(total, ColorValue::new(RED, 6));

        let empty: Vec<ColorValue> = vec![];
        assert_eq!(ColorValue::sum(RED, &empty).unwrap(), ColorValue::zero(RED));

        let mixed = vec![ColorValue::new(RED, 1), ColorValue::new(BLUE, 2)];
        assert!(ColorValue::sum(RED, &mixed).is_err());
        assert!(ColorValue::sum(BLUE, &values).is_err());
    }

    #[test]
    fn parse_rejects_fractions() {
        assert_eq!(ColorValue::parse(RED, "120").unwrap().amount(), 120);
        assert_eq!(ColorValue::parse(RED, " 7.00 ").unwrap().amount(), 7);
        assert!(matches!(
            ColorValue::parse(RED, "1.5"),
            Err(Error::InvalidValue(_))
        ));
        assert!(matches!(
            ColorValue::parse(RED, "ten"),
            Err(Error::InvalidValue(_))
        ));
        assert!(matches!(ColorValue::parse(RED, "3."), Err(Error::InvalidValue(_))));
    }

    #[test]
    fn overflow_is_invalid_value() {
        let a = ColorValue::new(RED, i64::MAX);
        let b = ColorValue::new(RED, 1);
        assert!(matches!(a.try_add(&b), Err(Error::InvalidValue(_))));
    }
}
