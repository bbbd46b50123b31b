mod chain;

use std::str::FromStr;
use std::sync::Arc;

use bitcoin::{
    absolute::LockTime,
    hashes::Hash,
    secp256k1::{self, SecretKey},
    transaction::Version,
    Address, Amount, CompressedPublicKey, Network, OutPoint, ScriptBuf, Sequence, Transaction,
    TxIn, TxOut, Txid, WPubkeyHash, Witness,
};
use chroma_core::{
    coins::CoinStore,
    color::{ColorDescriptor, ColorId, ColorMap, Scheme},
    config::Verification,
    keys::{AddressBook, KeyStore},
    scanner::{ColorDataBuilderManager, ScanContext, Strategy},
    store::{in_memory_database, ColorMetaStore, ColorStore},
    ChromaConfig, ColorData, SharedChain, SharedSpendIndex, TxPipeline,
};

pub use chain::{CallCount, MemoryChain};

/// Coinbase-like transaction paying `value` to `script`. `tag` goes into the
/// script sig so equal payments get distinct txids.
pub fn coinbase_to(script: ScriptBuf, value: u64, tag: u32) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: ScriptBuf::from_bytes(tag.to_le_bytes().to_vec()),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(value),
            script_pubkey: script,
        }],
    }
}

/// Unsigned transaction spending `inputs` into `outputs`.
pub fn spend(inputs: &[OutPoint], outputs: &[(ScriptBuf, u64)]) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: inputs
            .iter()
            .map(|outpoint| TxIn {
                previous_output: *outpoint,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            })
            .collect(),
        output: outputs
            .iter()
            .map(|(script, value)| TxOut {
                value: Amount::from_sat(*value),
                script_pubkey: script.clone(),
            })
            .collect(),
    }
}

/// A distinct p2wpkh script per `n`, with no key behind it.
pub fn script(n: u8) -> ScriptBuf {
    ScriptBuf::new_p2wpkh(&WPubkeyHash::from_byte_array([n; 20]))
}

pub fn address_script(address: &str) -> ScriptBuf {
    Address::from_str(address)
        .unwrap()
        .require_network(Network::Regtest)
        .unwrap()
        .script_pubkey()
}

/// Everything needed to compute color values over a [`MemoryChain`].
pub struct ColorEnv {
    pub chain: Arc<MemoryChain>,
    pub meta: ColorMetaStore,
    pub store: ColorStore,
    pub color_map: Arc<ColorMap>,
    pub builders: Arc<ColorDataBuilderManager>,
    pub color_data: ColorData,
}

impl ColorEnv {
    pub fn new(chain: Arc<MemoryChain>, aided: bool) -> Self {
        Self::with_reorg_depth(chain, aided, chroma_core::constants::DEFAULT_REORG_DEPTH)
    }

    pub fn with_reorg_depth(chain: Arc<MemoryChain>, aided: bool, reorg_depth: u32) -> Self {
        let db = in_memory_database().unwrap();
        let meta = ColorMetaStore::new(db.clone()).unwrap();
        let store = ColorStore::new(db).unwrap();
        let color_map = Arc::new(ColorMap::new(meta.clone()));

        let shared: SharedChain = chain.clone();
        let strategy = if aided {
            Strategy::Aided(chain.clone())
        } else {
            Strategy::FullScan
        };
        let ctx = ScanContext::new(shared.clone(), store.clone(), meta.clone())
            .with_reorg_depth(reorg_depth);
        let builders = Arc::new(ColorDataBuilderManager::new(
            strategy,
            ctx,
            color_map.clone(),
        ));
        let color_data = ColorData::new(shared, builders.clone(), store.clone());

        Self {
            chain,
            meta,
            store,
            color_map,
            builders,
            color_data,
        }
    }

    /// Register an order-based color issued at output `vout` of `txid`.
    pub fn register(&self, txid: Txid, vout: u32, height: u32) -> ColorId {
        let descriptor = ColorDescriptor::new(Scheme::Obc, txid, vout, height).to_string();
        self.color_map
            .resolve_color_desc(&descriptor, true)
            .unwrap()
            .unwrap()
    }
}

pub const FUNDING: u64 = 100_000;

/// A regtest wallet with three addresses: `u` holds base currency, `c`
/// receives colored coins and `r` belongs to somebody else.
///
/// Block 1 pays [`FUNDING`] to `u`.
pub struct WalletEnv {
    pub chain: Arc<MemoryChain>,
    pub keys: Arc<KeyStore>,
    pub color_map: Arc<ColorMap>,
    pub color_data: Arc<ColorData>,
    pub pipeline: TxPipeline,
    pub u: String,
    pub c: String,
    pub r: String,
}

impl WalletEnv {
    pub fn new(config: ChromaConfig) -> Self {
        let chain = Arc::new(MemoryChain::new());
        let shared: SharedChain = chain.clone();

        let mut keys = KeyStore::new(Network::Regtest);
        let u = keys.add_key(SecretKey::from_slice(&[0x11; 32]).unwrap());
        let c = keys.add_key(SecretKey::from_slice(&[0x22; 32]).unwrap());
        let secp = secp256k1::Secp256k1::new();
        let foreign = SecretKey::from_slice(&[0x33; 32]).unwrap().public_key(&secp);
        let r = Address::p2wpkh(&CompressedPublicKey(foreign), Network::Regtest).to_string();
        let keys = Arc::new(keys);

        let color_db = in_memory_database().unwrap();
        let meta = ColorMetaStore::new(color_db.clone()).unwrap();
        let store = ColorStore::new(color_db).unwrap();
        let color_map = Arc::new(ColorMap::new(meta.clone()));
        let spends: SharedSpendIndex = chain.clone();
        let strategy = Strategy::from_config(&config, Some(spends)).unwrap();
        let ctx = ScanContext::new(shared.clone(), store.clone(), meta)
            .with_reorg_depth(config.reorg_depth);
        let builders = Arc::new(ColorDataBuilderManager::new(
            strategy,
            ctx,
            color_map.clone(),
        ));
        let color_data = Arc::new(ColorData::new(shared.clone(), builders, store));

        let coins = CoinStore::new(in_memory_database().unwrap(), Network::Regtest).unwrap();
        let mut addresses = AddressBook::new();
        addresses.add_address(ColorId::UNCOLORED, u.clone());

        let pipeline = TxPipeline::new(
            config,
            shared,
            color_map.clone(),
            color_data.clone(),
            coins,
            addresses,
            keys.clone(),
        )
        .unwrap();

        let env = Self {
            chain,
            keys,
            color_map,
            color_data,
            pipeline,
            u,
            c,
            r,
        };

        let funding = coinbase_to(address_script(&env.u), FUNDING, 1);
        env.pipeline
            .coins()
            .apply_tx(&funding, env.keys.as_ref())
            .unwrap();
        env.chain.mine_block(vec![funding]);
        env.refresh();
        env
    }

    pub fn regtest() -> Self {
        Self::new(ChromaConfig {
            network: Network::Regtest,
            fee_rate_sat_vb: 1,
            ..Default::default()
        })
    }

    pub fn refresh(&self) {
        self.pipeline
            .coins()
            .refresh_confirmations(self.chain.as_ref(), Verification::Confirmations)
            .unwrap();
        self.pipeline
            .coins()
            .refresh_confirmations(self.chain.as_ref(), Verification::Full)
            .unwrap();
    }

    /// Mine the mempool and update coin confirmations.
    pub fn mine(&self) -> u32 {
        let height = self.chain.mine();
        self.refresh();
        height
    }

    /// Issue `amount` units of a new color to `c`, confirm it and register
    /// `c` as that color's address.
    pub fn issue(&mut self, amount: i64) -> (ColorId, Txid) {
        let (signed, descriptor) = self.pipeline.issue(&self.c, amount).unwrap();
        let txid = self.pipeline.publish(&signed).unwrap();
        self.mine();

        let color_id = self
            .color_map
            .resolve_color_desc(&descriptor, true)
            .unwrap()
            .unwrap();
        let c = self.c.clone();
        self.pipeline.addresses_mut().add_address(color_id, c);
        log::info!("issued color {} in {}", color_id, txid);
        (color_id, txid)
    }
}
