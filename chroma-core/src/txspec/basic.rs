use serde::{Deserialize, Serialize};

/// A user-facing asset: a name and the colors that make it up.
///
/// The base currency is an asset whose single color descriptor is empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetDefinition {
    moniker: String,
    color_set: Vec<String>,
}

impl AssetDefinition {
    pub fn new(moniker: impl Into<String>, color_set: Vec<String>) -> Self {
        Self {
            moniker: moniker.into(),
            color_set,
        }
    }

    pub fn bitcoin() -> Self {
        Self::new("bitcoin", vec![String::new()])
    }

    pub fn moniker(&self) -> &str {
        &self.moniker
    }

    /// Color descriptors of this asset.
    pub fn color_set(&self) -> &[String] {
        &self.color_set
    }

    pub fn is_monocolor(&self) -> bool {
        self.color_set.len() == 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicTarget {
    pub address: String,
    pub asset: AssetDefinition,
    pub amount: i64,
}

/// A payment as the user states it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicTxSpec {
    targets: Vec<BasicTarget>,
}

impl BasicTxSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_target(
        mut self,
        address: impl Into<String>,
        asset: AssetDefinition,
        amount: i64,
    ) -> Self {
        self.targets.push(BasicTarget {
            address: address.into(),
            asset,
            amount,
        });
        self
    }

    pub fn targets(&self) -> &[BasicTarget] {
        &self.targets
    }

    /// Every target pays the same asset.
    pub fn is_monoasset(&self) -> bool {
        match self.targets.split_first() {
            Some((first, rest)) => rest.iter().all(|t| t.asset == first.asset),
            None => false,
        }
    }

    /// Every target pays the same asset, and that asset has one color.
    pub fn is_monocolor(&self) -> bool {
        self.is_monoasset() && self.targets[0].asset.is_monocolor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gold() -> AssetDefinition {
        AssetDefinition::new("gold", vec!["obc:aa:0:1".to_string()])
    }

    #[test]
    fn mono_predicates() {
        let empty = BasicTxSpec::new();
        assert!(!empty.is_monoasset());
        assert!(!empty.is_monocolor());

        let mono = BasicTxSpec::new()
            .add_target("a", gold(), 1)
            .add_target("b", gold(), 2);
        assert!(mono.is_monoasset());
        assert!(mono.is_monocolor());

        let mixed = mono.clone().add_target("c", AssetDefinition::bitcoin(), 3);
        assert!(!mixed.is_monoasset());
        assert!(!mixed.is_monocolor());

        let basket = AssetDefinition::new(
            "basket",
            vec!["obc:aa:0:1".to_string(), "obc:bb:0:2".to_string()],
        );
        let multi = BasicTxSpec::new().add_target("a", basket, 5);
        assert!(multi.is_monoasset());
        assert!(!multi.is_monocolor());
    }
}
