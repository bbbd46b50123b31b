use bitcoin::{
    consensus::encode::serialize,
    ecdsa,
    hashes::Hash,
    secp256k1::{self, Message, PublicKey},
    sighash::{EcdsaSighashType, SighashCache},
    CompressedPublicKey, Network, ScriptBuf, Transaction, Txid,
};

use crate::coins::Coin;
use crate::error::{Error, Result};
use crate::keys::SigningProvider;

use super::ComposedTxSpec;

/// A fully signed transaction and its serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTxSpec {
    tx: Transaction,
    raw: Vec<u8>,
}

impl SignedTxSpec {
    pub fn txid(&self) -> Txid {
        self.tx.compute_txid()
    }

    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.raw)
    }
}

/// Sign every input of `composed` and check each signature before returning.
pub(crate) fn sign(
    composed: &ComposedTxSpec,
    signer: &dyn SigningProvider,
    network: Network,
) -> Result<SignedTxSpec> {
    let mut tx = composed.to_unsigned_tx(network)?;

    let witnesses = {
        let mut cache = SighashCache::new(&tx);
        composed
            .inputs()
            .iter()
            .enumerate()
            .map(|(index, coin)| {
                if !coin.script_pubkey.is_p2wpkh() {
                    return Err(Error::InvalidScript(index));
                }
                let sighash = cache
                    .p2wpkh_signature_hash(
                        index,
                        &coin.script_pubkey,
                        coin.value,
                        EcdsaSighashType::All,
                    )
                    .map_err(|e| Error::Sighash(e.to_string()))?;
                signer.sign_p2wpkh(&coin.address, sighash)
            })
            .collect::<Result<Vec<_>>>()?
    };
    for (input, witness) in tx.input.iter_mut().zip(witnesses) {
        input.witness = witness;
    }

    verify_inputs(&tx, composed.inputs())?;

    let raw = serialize(&tx);
    Ok(SignedTxSpec { tx, raw })
}

/// Check each input's witness against the output it spends.
fn verify_inputs(tx: &Transaction, prevouts: &[Coin]) -> Result<()> {
    let secp = secp256k1::Secp256k1::verification_only();
    let mut cache = SighashCache::new(tx);

    for (index, coin) in prevouts.iter().enumerate() {
        let invalid = || Error::InvalidScript(index);
        let witness = &tx.input.get(index).ok_or_else(invalid)?.witness;
        if witness.len() != 2 {
            return Err(invalid());
        }

        let signature = witness
            .nth(0)
            .and_then(|bytes| ecdsa::Signature::from_slice(bytes).ok())
            .ok_or_else(invalid)?;
        let pubkey = witness
            .nth(1)
            .and_then(|bytes| PublicKey::from_slice(bytes).ok())
            .ok_or_else(invalid)?;

        let expected = ScriptBuf::new_p2wpkh(&CompressedPublicKey(pubkey).wpubkey_hash());
        if expected != coin.script_pubkey {
            return Err(invalid());
        }

        let sighash = cache
            .p2wpkh_signature_hash(index, &coin.script_pubkey, coin.value, signature.sighash_type)
            .map_err(|_| invalid())?;
        let msg = Message::from_digest(sighash.to_byte_array());
        secp.verify_ecdsa(&msg, &signature.signature, &pubkey)
            .map_err(|_| invalid())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyStore;
    use crate::txspec::ComposedOutput;
    use bitcoin::{secp256k1::SecretKey, Address, Amount, OutPoint};
    use std::str::FromStr;

    fn coin_for(address: &str, value: u64) -> Coin {
        let script = Address::from_str(address)
            .unwrap()
            .require_network(Network::Regtest)
            .unwrap()
            .script_pubkey();
        Coin {
            id: 1,
            outpoint: OutPoint::new(Txid::from_byte_array([9; 32]), 0),
            value: Amount::from_sat(value),
            script_pubkey: script,
            address: address.to_string(),
            colorvalues: vec![],
        }
    }

    fn composed(input: Coin, to: &str) -> ComposedTxSpec {
        ComposedTxSpec::new(
            vec![input],
            vec![ComposedOutput {
                address: to.to_string(),
                value: Amount::from_sat(9_000),
            }],
        )
    }

    #[test]
    fn signed_inputs_verify() {
        let mut keys = KeyStore::new(Network::Regtest);
        let from = keys.add_key(SecretKey::from_slice(&[1; 32]).unwrap());
        let to = keys.add_key(SecretKey::from_slice(&[2; 32]).unwrap());

        let signed = sign(&composed(coin_for(&from, 10_000), &to), &keys, Network::Regtest).unwrap();
        assert_eq!(signed.transaction().input[0].witness.len(), 2);
        assert_eq!(signed.raw(), serialize(signed.transaction()).as_slice());
    }

    /// Signs with its own key whatever address it is asked for.
    struct WrongKey(KeyStore, String);

    impl SigningProvider for WrongKey {
        fn owns(&self, _address: &str) -> bool {
            true
        }

        fn sign_p2wpkh(
            &self,
            _address: &str,
            sighash: bitcoin::sighash::SegwitV0Sighash,
        ) -> Result<bitcoin::Witness> {
            self.0.sign_p2wpkh(&self.1, sighash)
        }
    }

    #[test]
    fn wrong_key_fails_verification() {
        let mut keys = KeyStore::new(Network::Regtest);
        let from = keys.add_key(SecretKey::from_slice(&[1; 32]).unwrap());

        let mut other = KeyStore::new(Network::Regtest);
        let other_address = other.add_key(SecretKey::from_slice(&[3; 32]).unwrap());
        let signer = WrongKey(other, other_address);

        assert!(matches!(
            sign(&composed(coin_for(&from, 10_000), &from), &signer, Network::Regtest),
            Err(Error::InvalidScript(0))
        ));
    }

    #[test]
    fn only_p2wpkh_inputs_are_signed() {
        let mut keys = KeyStore::new(Network::Regtest);
        let to = keys.add_key(SecretKey::from_slice(&[2; 32]).unwrap());
        let mut input = coin_for(&to, 10_000);
        input.script_pubkey = ScriptBuf::new();

        assert!(matches!(
            sign(&composed(input, &to), &keys, Network::Regtest),
            Err(Error::InvalidScript(0))
        ));
    }
}
