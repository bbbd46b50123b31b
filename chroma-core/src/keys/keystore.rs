use std::collections::HashMap;

use bitcoin::{
    ecdsa,
    hashes::Hash,
    secp256k1::{self, All, Message, SecretKey},
    sighash::{EcdsaSighashType, SegwitV0Sighash},
    Address, CompressedPublicKey, Network, Witness,
};

use crate::error::{Error, Result};

use super::SigningProvider;

/// In-memory P2WPKH keys, indexed by address.
pub struct KeyStore {
    network: Network,
    secp: secp256k1::Secp256k1<All>,
    keys: HashMap<String, SecretKey>,
}

impl KeyStore {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            secp: secp256k1::Secp256k1::new(),
            keys: HashMap::new(),
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Import `secret` and return its P2WPKH address.
    pub fn add_key(&mut self, secret: SecretKey) -> String {
        let pubkey = CompressedPublicKey(secret.public_key(&self.secp));
        let address = Address::p2wpkh(&pubkey, self.network).to_string();
        self.keys.insert(address.clone(), secret);
        address
    }

    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

impl SigningProvider for KeyStore {
    fn owns(&self, address: &str) -> bool {
        self.keys.contains_key(address)
    }

    fn sign_p2wpkh(&self, address: &str, sighash: SegwitV0Sighash) -> Result<Witness> {
        let secret = self
            .keys
            .get(address)
            .ok_or_else(|| Error::UnknownAddress(address.to_string()))?;

        let msg = Message::from_digest(sighash.to_byte_array());
        let signature = ecdsa::Signature {
            signature: self.secp.sign_ecdsa(&msg, secret),
            sighash_type: EcdsaSighashType::All,
        };
        Ok(Witness::p2wpkh(&signature, &secret.public_key(&self.secp)))
    }
}
