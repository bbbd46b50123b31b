use std::collections::HashMap;

use crate::color::ColorId;
use crate::error::{Error, Result};

/// Wallet addresses grouped by the color they receive.
///
/// The first address of a color doubles as its change address.
#[derive(Debug, Clone, Default)]
pub struct AddressBook {
    by_color: HashMap<ColorId, Vec<String>>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_address(&mut self, color_id: ColorId, address: impl Into<String>) {
        let address = address.into();
        let addresses = self.by_color.entry(color_id).or_default();
        if !addresses.contains(&address) {
            addresses.push(address);
        }
    }

    pub fn addresses(&self, color_id: ColorId) -> &[String] {
        self.by_color
            .get(&color_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether `address` is registered for the base currency and nothing else.
    pub fn is_uncolored_address(&self, address: &str) -> bool {
        let mut registered = self
            .by_color
            .iter()
            .filter(|(_, addresses)| addresses.iter().any(|a| a == address))
            .map(|(color_id, _)| *color_id);
        matches!(
            (registered.next(), registered.next()),
            (Some(color_id), None) if color_id.is_uncolored()
        )
    }

    pub fn change_address(&self, color_id: ColorId) -> Result<String> {
        self.addresses(color_id)
            .first()
            .cloned()
            .ok_or_else(|| Error::Address(format!("no address for color {}", color_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_address_is_change() {
        let mut book = AddressBook::new();
        book.add_address(ColorId(3), "a");
        book.add_address(ColorId(3), "b");
        book.add_address(ColorId(3), "a");

        assert_eq!(book.addresses(ColorId(3)), ["a".to_string(), "b".to_string()]);
        assert_eq!(book.change_address(ColorId(3)).unwrap(), "a");
        assert!(book.change_address(ColorId::UNCOLORED).is_err());
    }

    #[test]
    fn uncolored_address_has_no_other_color() {
        let mut book = AddressBook::new();
        book.add_address(ColorId::UNCOLORED, "plain");
        book.add_address(ColorId::UNCOLORED, "shared");
        book.add_address(ColorId(3), "shared");
        book.add_address(ColorId(3), "red");

        assert!(book.is_uncolored_address("plain"));
        assert!(!book.is_uncolored_address("shared"));
        assert!(!book.is_uncolored_address("red"));
        assert!(!book.is_uncolored_address("unknown"));
    }
}
