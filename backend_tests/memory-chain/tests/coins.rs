use bitcoin::{Network, OutPoint};
use chroma_core::{
    coins::CoinQueryParams,
    color::{ColorId, ColorValue},
    config::Verification,
    txspec::{AssetDefinition, BasicTxSpec},
    ChainClient, ChromaConfig,
};
use memory_chain::{WalletEnv, FUNDING};

fn unconfirmed() -> CoinQueryParams {
    CoinQueryParams {
        include_unconfirmed: true,
        ..Default::default()
    }
}

#[test]
fn base_currency_query_synthesizes_values() {
    let env = WalletEnv::regtest();
    let coins = env
        .pipeline
        .coin_query()
        .get_result(&[ColorId::UNCOLORED], &[env.u.clone()], CoinQueryParams::default())
        .unwrap();

    assert_eq!(coins.len(), 1);
    assert_eq!(
        coins[0].colorvalues,
        vec![ColorValue::uncolored(FUNDING as i64)]
    );
    assert_eq!(coins[0].address, env.u);
}

#[test]
fn spent_and_unconfirmed_filters() {
    let env = WalletEnv::regtest();
    let payment = BasicTxSpec::new().add_target(&env.r, AssetDefinition::bitcoin(), 20_000);
    let signed = env.pipeline.make_signed(payment).unwrap();
    env.pipeline.publish(&signed).unwrap();

    let query = env.pipeline.coin_query();
    let uncolored = [ColorId::UNCOLORED];
    let at_u = [env.u.clone()];

    // funding is spent and the change is not confirmed
    let confirmed = query
        .get_result(&uncolored, &at_u, CoinQueryParams::default())
        .unwrap();
    assert!(confirmed.is_empty());

    let with_pending = query.get_result(&uncolored, &at_u, unconfirmed()).unwrap();
    assert_eq!(with_pending.len(), 1);
    assert_eq!(with_pending[0].outpoint, OutPoint::new(signed.txid(), 1));
    assert_eq!(with_pending[0].value.to_sat(), FUNDING - 20_000 - 250);

    let only_pending = CoinQueryParams {
        only_unconfirmed: true,
        ..Default::default()
    };
    assert_eq!(
        query.get_result(&uncolored, &at_u, only_pending).unwrap(),
        with_pending
    );

    let spent = CoinQueryParams {
        spent: Some(true),
        ..Default::default()
    };
    let spent = query.get_result(&uncolored, &at_u, spent).unwrap();
    assert_eq!(spent.len(), 1);
    assert_eq!(spent[0].value.to_sat(), FUNDING);

    let any = CoinQueryParams {
        spent: None,
        include_unconfirmed: true,
        only_unconfirmed: false,
    };
    assert_eq!(query.get_result(&uncolored, &at_u, any).unwrap().len(), 2);

    // the payment to r is not ours
    assert!(env
        .pipeline
        .coin_query()
        .get_result(&uncolored, &[env.r.clone()], unconfirmed())
        .unwrap()
        .is_empty());
}

#[test]
fn colored_coins_carry_their_values() {
    let mut env = WalletEnv::regtest();
    let (red, genesis) = env.issue(10_000);

    let query = env.pipeline.coin_query();
    let coins = query
        .get_result(&[red], &[env.c.clone()], CoinQueryParams::default())
        .unwrap();
    assert_eq!(coins.len(), 1);
    assert_eq!(coins[0].outpoint, OutPoint::new(genesis, 0));
    assert_eq!(coins[0].colorvalue(red), Some(&ColorValue::new(red, 10_000)));

    // the issuance change holds no red
    let coins = query
        .get_result(&[red], &[env.u.clone()], CoinQueryParams::default())
        .unwrap();
    assert!(coins.is_empty());
}

#[test]
fn unconfirmed_colored_coins_are_left_out() {
    let mut env = WalletEnv::regtest();
    let (red, _) = env.issue(10_000);
    let descriptor = env.color_map.find_color_desc(red).unwrap().unwrap();

    let payment =
        BasicTxSpec::new().add_target(&env.r, AssetDefinition::new("red", vec![descriptor]), 4_000);
    let signed = env.pipeline.make_signed(payment).unwrap();
    env.pipeline.publish(&signed).unwrap();

    // the colored change at c exists but its color cannot be known yet
    let change = env
        .pipeline
        .coins()
        .find_coin(&OutPoint::new(signed.txid(), 1))
        .unwrap();
    assert!(change.is_some());

    let coins = env
        .pipeline
        .coin_query()
        .get_result(&[red], &[env.c.clone()], unconfirmed())
        .unwrap();
    assert!(coins.is_empty());

    env.mine();
    let coins = env
        .pipeline
        .coin_query()
        .get_result(&[red], &[env.c.clone()], CoinQueryParams::default())
        .unwrap();
    assert_eq!(coins.len(), 1);
    assert_eq!(coins[0].colorvalue(red), Some(&ColorValue::new(red, 6_000)));
}

#[test]
fn confirmations_follow_the_tip() {
    let env = WalletEnv::regtest();
    let coins = env.pipeline.coins();
    let funding = coins.get_coins_for_address(&env.u).unwrap().remove(0);

    assert_eq!(coins.get_confirmations(funding.id).unwrap(), 1);
    env.mine();
    env.mine();
    assert_eq!(coins.get_confirmations(funding.id).unwrap(), 3);

    assert_eq!(
        coins.get_blocks(funding.id).unwrap(),
        vec![env.chain.get_block_hash(1).unwrap()]
    );

    assert!(coins
        .is_confirmed(funding.id, Verification::Confirmations, 3)
        .unwrap());
    assert!(!coins
        .is_confirmed(funding.id, Verification::Confirmations, 4)
        .unwrap());
    assert!(coins.is_confirmed(funding.id, Verification::Full, 0).unwrap());
}

#[test]
fn minimum_confirmations_gate_queries() {
    let env = WalletEnv::new(ChromaConfig {
        network: Network::Regtest,
        fee_rate_sat_vb: 1,
        min_confirmations: 3,
        ..Default::default()
    });
    let query = || {
        env.pipeline
            .coin_query()
            .get_result(&[ColorId::UNCOLORED], &[env.u.clone()], CoinQueryParams::default())
            .unwrap()
    };

    assert!(query().is_empty());
    env.mine();
    env.mine();
    assert_eq!(query().len(), 1);
}

#[test]
fn full_verification_uses_blocks() {
    let env = WalletEnv::new(ChromaConfig {
        network: Network::Regtest,
        fee_rate_sat_vb: 1,
        verification: Verification::Full,
        ..Default::default()
    });
    let payment = BasicTxSpec::new().add_target(&env.r, AssetDefinition::bitcoin(), 1_000);
    let signed = env.pipeline.make_signed(payment).unwrap();
    env.pipeline.publish(&signed).unwrap();

    let query = env.pipeline.coin_query();
    let at_u = [env.u.clone()];
    assert!(query
        .get_result(&[ColorId::UNCOLORED], &at_u, CoinQueryParams::default())
        .unwrap()
        .is_empty());

    env.mine();
    let coins = query
        .get_result(&[ColorId::UNCOLORED], &at_u, CoinQueryParams::default())
        .unwrap();
    assert_eq!(coins.len(), 1);
    assert_eq!(coins[0].outpoint, OutPoint::new(signed.txid(), 1));
}

#[test]
fn colored_address_never_yields_plain_currency() {
    let mut env = WalletEnv::regtest();
    let (red, genesis) = env.issue(10_000);

    let query = env.pipeline.coin_query();
    let coins = query
        .get_result(&[ColorId::UNCOLORED], &[env.c.clone()], CoinQueryParams::default())
        .unwrap();
    assert!(coins.is_empty());

    // listing c for the base currency as well does not turn red into bitcoin
    let c = env.c.clone();
    env.pipeline.addresses_mut().add_address(ColorId::UNCOLORED, c);
    let query = env.pipeline.coin_query();
    let coins = query
        .get_result(&[ColorId::UNCOLORED], &[env.c.clone()], CoinQueryParams::default())
        .unwrap();
    assert!(coins.is_empty());
    let coins = query
        .get_result(&[red], &[env.c.clone()], CoinQueryParams::default())
        .unwrap();
    assert_eq!(coins.len(), 1);
    assert_eq!(coins[0].outpoint, OutPoint::new(genesis, 0));
}

#[test]
fn mixed_request_keeps_plain_coins() {
    let mut env = WalletEnv::regtest();
    let (red, genesis) = env.issue(10_000);

    let query = env.pipeline.coin_query();
    let coins = query
        .get_result(
            &[ColorId::UNCOLORED, red],
            &[env.u.clone(), env.c.clone()],
            CoinQueryParams::default(),
        )
        .unwrap();

    let found: Vec<(OutPoint, Vec<ColorValue>)> = coins
        .into_iter()
        .map(|coin| (coin.outpoint, coin.colorvalues))
        .collect();
    assert_eq!(
        found,
        vec![
            (
                OutPoint::new(genesis, 1),
                vec![ColorValue::uncolored((FUNDING - 10_000 - 300) as i64)]
            ),
            (OutPoint::new(genesis, 0), vec![ColorValue::new(red, 10_000)]),
        ]
    );
}
