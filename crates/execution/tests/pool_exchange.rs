mod common;

use common::*;
use proptest::prelude::*;
use stableswap_execution::prelude::*;

fn balanced_pool() -> Harness {
    let mut h = Harness::plain(&[18, 18], 2000, 1_000_000);
    h.seed(ALICE, &[units(1_000_000), units(1_000_000)]);
    h
}

#[test]
fn test_balanced_deposit_and_small_swap() {
    let mut h = Harness::plain(&[18, 18], 2000, 1_000_000);
    let minted = h.seed(ALICE, &[units(1_000_000), units(1_000_000)]);
    assert_eq!(minted, units(2_000_000));
    assert_eq!(h.virtual_price(), U256::from(E18));

    h.fund(BOB, &[units(1_000), U256::zero()]);
    let dy = h
        .call(BOB, |pool, ctx| pool.exchange(ctx, 0, 1, units(1_000), U256::zero(), None))
        .unwrap();

    assert!(dy > units(999) && dy < units(1_000), "dy = {dy}");
    assert_eq!(h.balance(coin(1), BOB), dy);
    assert_eq!(h.balance(coin(0), BOB), U256::zero());
    // Fees stay in the pool, so the invariant per share grows.
    assert!(h.virtual_price() > U256::from(E18));
}

#[test]
fn test_get_dy_matches_exchange() {
    let mut h = balanced_pool();
    let quote = h
        .view(|pool, view| pool.get_dy(view, 1, 0, units(25_000)))
        .unwrap();

    h.fund(BOB, &[U256::zero(), units(25_000)]);
    let dy = h
        .call(BOB, |pool, ctx| pool.exchange(ctx, 1, 0, units(25_000), quote, None))
        .unwrap();
    assert_eq!(dy, quote);
}

#[test]
fn test_get_dx_inverts_get_dy() {
    let h = balanced_pool();
    let wanted = units(500);
    let dx = h.view(|pool, view| pool.get_dx(view, 0, 1, wanted)).unwrap();
    let dy = h.view(|pool, view| pool.get_dy(view, 0, 1, dx)).unwrap();

    assert!(dx > wanted);
    assert!(diff(dy, wanted) <= wanted / U256::from(1_000_000u64));
}

#[test]
fn test_get_dx_beyond_balance_fails() {
    let h = balanced_pool();
    let err = h
        .view(|pool, view| pool.get_dx(view, 0, 1, units(2_000_000)))
        .unwrap_err();
    assert!(matches!(err, PoolError::InsufficientLiquidity(_)));
}

#[test]
fn test_mixed_decimals_swap() {
    let mut h = Harness::plain(&[6, 18], 2000, 1_000_000);
    h.seed(ALICE, &[units_of(1_000_000, 6), units(1_000_000)]);

    h.fund(BOB, &[units_of(1_000, 6), U256::zero()]);
    let dy = h
        .call(BOB, |pool, ctx| {
            pool.exchange(ctx, 0, 1, units_of(1_000, 6), U256::zero(), None)
        })
        .unwrap();
    assert!(dy > units(999) && dy < units(1_000), "dy = {dy}");

    let back = h
        .view(|pool, view| pool.get_dy(view, 1, 0, units(1_000)))
        .unwrap();
    assert!(back > units_of(999, 6) && back < units_of(1_001, 6), "back = {back}");
}

#[test]
fn test_slippage_rolls_back_everything() {
    let mut h = balanced_pool();
    h.fund(BOB, &[units(1_000), U256::zero()]);

    let stored_before = h.pool.stored_balances().to_vec();
    let events_before = h.pool.events().len();
    let oracle_before = h.pool.last_price(0).unwrap();

    let err = h
        .call(BOB, |pool, ctx| {
            pool.exchange(ctx, 0, 1, units(1_000), units(1_000), None)
        })
        .unwrap_err();
    assert!(matches!(err, PoolError::SlippageExceeded { .. }));

    assert_eq!(h.pool.stored_balances(), stored_before.as_slice());
    assert_eq!(h.pool.events().len(), events_before);
    assert_eq!(h.pool.last_price(0).unwrap(), oracle_before);
    assert_eq!(h.pool.admin_balances(1).unwrap(), U256::zero());
    assert_eq!(h.balance(coin(0), BOB), units(1_000));
    assert_eq!(h.balance(coin(0), POOL), units(1_000_000));
    assert_eq!(h.ledger.depth(), 0);
}

#[test]
fn test_invalid_swap_arguments() {
    let mut h = balanced_pool();
    h.fund(BOB, &[units(10), units(10)]);

    let same = h.call(BOB, |pool, ctx| pool.exchange(ctx, 0, 0, units(1), U256::zero(), None));
    assert!(matches!(same, Err(PoolError::InvalidCoinIndex { .. })));

    let out_of_range =
        h.call(BOB, |pool, ctx| pool.exchange(ctx, 0, 2, units(1), U256::zero(), None));
    assert!(matches!(out_of_range, Err(PoolError::InvalidCoinIndex { index: 2, .. })));

    let zero = h.call(BOB, |pool, ctx| pool.exchange(ctx, 0, 1, U256::zero(), U256::zero(), None));
    assert_eq!(zero.unwrap_err(), PoolError::ZeroAmount);

    let unfunded =
        h.call(BOB, |pool, ctx| pool.exchange(ctx, 0, 1, units(11), U256::zero(), None));
    assert!(matches!(unfunded, Err(PoolError::InsufficientBalance { .. })));
}

#[test]
fn test_exchange_received_uses_prefunded_coins() {
    let mut h = balanced_pool();
    h.fund(BOB, &[units(300), U256::zero()]);
    let quote = h.view(|pool, view| pool.get_dy(view, 0, 1, units(300))).unwrap();

    // Nothing sent yet.
    let early = h.call(BOB, |pool, ctx| {
        pool.exchange_received(ctx, 0, 1, units(300), U256::zero(), None)
    });
    assert!(matches!(early, Err(PoolError::InsufficientBalance { .. })));

    h.ledger
        .transfer(coin(0), addr(BOB), addr(POOL), units(300))
        .unwrap();
    let dy = h
        .call(BOB, |pool, ctx| {
            pool.exchange_received(ctx, 0, 1, units(300), quote, Some(addr(ALICE)))
        })
        .unwrap();

    assert_eq!(dy, quote);
    assert_eq!(h.balance(coin(1), ALICE), dy);
    assert_eq!(h.balances()[0], units(1_000_300));
}

#[test]
fn test_exchange_received_refused_on_rebasing_pool() {
    let config = PoolConfig::new(
        "Rebasing",
        "RB",
        vec![
            CoinSpec::rebasing(coin(0), 18),
            CoinSpec::standard(coin(1), 18),
            CoinSpec::standard(coin(2), 18),
        ],
        200,
        addr(ADMIN),
    );
    let mut h = Harness::new(config);
    h.seed(ALICE, &[units(1_000), units(1_000), units(1_000)]);
    h.fund(BOB, &[units(10), units(10), units(10)]);

    for i in 0..3 {
        for j in 0..3 {
            if i == j {
                continue;
            }
            let token = h.pool.coins()[i].address;
            h.ledger.transfer(token, addr(BOB), addr(POOL), units(1)).unwrap();
            let err = h
                .call(BOB, |pool, ctx| {
                    pool.exchange_received(ctx, i, j, units(1), U256::zero(), None)
                })
                .unwrap_err();
            assert_eq!(err, PoolError::UnsupportedForRebasingPool);
        }
    }

    // Plain exchanges still work.
    assert!(
        h.call(BOB, |pool, ctx| pool.exchange(ctx, 1, 2, units(1), U256::zero(), None))
            .is_ok()
    );
}

#[test]
fn test_rebase_accrues_to_lps() {
    let config = PoolConfig::new(
        "Rebasing",
        "RB",
        vec![CoinSpec::rebasing(coin(0), 18), CoinSpec::standard(coin(1), 18)],
        200,
        addr(ADMIN),
    );
    let mut h = Harness::new(config);
    h.seed(ALICE, &[units(1_000), units(1_000)]);
    let vp_before = h.virtual_price();

    h.ledger
        .rebase(coin(0), U256::from(101u64), U256::from(100u64))
        .unwrap();

    assert_eq!(h.balances()[0], units(1_010));
    assert!(h.virtual_price() > vp_before);
}

#[test]
fn test_admin_fees_accrue_and_withdraw() {
    let mut h = balanced_pool();
    h.fund(BOB, &[units(50_000), U256::zero()]);
    h.call(BOB, |pool, ctx| pool.exchange(ctx, 0, 1, units(50_000), U256::zero(), None))
        .unwrap();

    let accrued = h.pool.admin_balances(1).unwrap();
    assert!(!accrued.is_zero());
    assert_eq!(h.pool.admin_balances(0).unwrap(), U256::zero());
    // LP balances exclude the admin share.
    assert_eq!(h.balances()[1], h.pool.stored_balances()[1] - accrued);

    let denied = h.call(BOB, |pool, ctx| pool.withdraw_admin_fees(ctx));
    assert_eq!(denied.unwrap_err(), PoolError::Unauthorized);

    let paid = h.call(ADMIN, |pool, ctx| pool.withdraw_admin_fees(ctx)).unwrap();
    assert_eq!(paid, vec![U256::zero(), accrued]);
    assert_eq!(h.balance(coin(1), FEE_RECEIVER), accrued);
    assert_eq!(h.pool.admin_balances(1).unwrap(), U256::zero());
    assert_eq!(
        h.pool.events().last().map(|e| e.event_type),
        Some(PoolEventType::WithdrawAdminFees)
    );
}

#[test]
fn test_exchange_event_and_price_oracle() {
    let mut h = balanced_pool();
    h.pool.drain_events();
    h.fund(BOB, &[units(100_000), U256::zero()]);
    let dy = h
        .call(BOB, |pool, ctx| pool.exchange(ctx, 0, 1, units(100_000), U256::zero(), None))
        .unwrap();

    let events = h.pool.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, PoolEventType::TokenExchange);
    assert_eq!(
        events[0].data,
        EventData::Exchange(ExchangeData {
            buyer: addr(BOB),
            sold_id: 0,
            tokens_sold: units(100_000),
            bought_id: 1,
            tokens_bought: dy,
        })
    );

    // Coin 1 is now scarcer, so it costs more than one coin 0.
    let last = h.pool.last_price(0).unwrap();
    assert!(last > U256::from(E18));

    // Same block: the EMA has not moved yet.
    assert_eq!(h.pool.price_oracle(0, T0).unwrap(), U256::from(E18));
    let one_window = h.pool.price_oracle(0, T0 + 866).unwrap();
    assert!(one_window > U256::from(E18) && one_window < last);
    assert_eq!(h.pool.price_oracle(0, T0 + 866 * 50).unwrap(), last);
}

#[test]
fn test_donation_accrues_to_lps_in_rebasing_pool() {
    let config = PoolConfig::new(
        "Rebasing",
        "RB",
        vec![CoinSpec::rebasing(coin(0), 18), CoinSpec::standard(coin(1), 18)],
        200,
        addr(ADMIN),
    );
    let mut h = Harness::new(config);
    h.seed(ALICE, &[units(1_000), units(1_000)]);
    let vp_before = h.virtual_price();

    h.fund(BOB, &[U256::zero(), units(100)]);
    h.ledger
        .transfer(coin(1), addr(BOB), addr(POOL), units(100))
        .unwrap();

    assert_eq!(h.balances(), vec![units(1_000), units(1_100)]);
    assert!(h.virtual_price() > vp_before);
}

#[test]
fn test_donation_ignored_by_standard_pool() {
    let mut h = balanced_pool();
    h.fund(BOB, &[U256::zero(), units(100)]);
    h.ledger
        .transfer(coin(1), addr(BOB), addr(POOL), units(100))
        .unwrap();
    assert_eq!(h.balances(), vec![units(1_000_000), units(1_000_000)]);
    assert_eq!(h.virtual_price(), U256::from(E18));
}

#[test]
fn test_pull_requires_allowance() {
    let mut h = balanced_pool();
    h.ledger.mint(coin(0), addr(BOB), units(10)).unwrap();

    let err = h
        .call(BOB, |pool, ctx| pool.exchange(ctx, 0, 1, units(10), U256::zero(), None))
        .unwrap_err();
    assert_eq!(
        err,
        PoolError::InsufficientBalance {
            coin: coin(0),
            holder: addr(BOB),
            needed: units(10),
            available: U256::zero(),
        }
    );
    assert_eq!(h.balance(coin(0), BOB), units(10));

    h.ledger
        .approve(coin(0), addr(BOB), addr(POOL), units(10))
        .unwrap();
    h.call(BOB, |pool, ctx| pool.exchange(ctx, 0, 1, units(10), U256::zero(), None))
        .unwrap();
    assert_eq!(h.balance(coin(0), BOB), U256::zero());
    assert_eq!(h.ledger.allowance(coin(0), addr(BOB), addr(POOL)), U256::zero());
}

#[test]
fn test_failed_pull_keeps_allowance() {
    let mut h = balanced_pool();
    h.ledger.mint(coin(0), addr(BOB), units(10)).unwrap();
    h.ledger
        .approve(coin(0), addr(BOB), addr(POOL), units(10))
        .unwrap();

    let err = h
        .call(BOB, |pool, ctx| pool.exchange(ctx, 0, 1, units(10), units(10), None))
        .unwrap_err();
    assert!(matches!(err, PoolError::SlippageExceeded { .. }));
    assert_eq!(h.ledger.allowance(coin(0), addr(BOB), addr(POOL)), units(10));
}

#[test]
fn test_lp_shares_move_by_transfer_from() {
    let mut h = balanced_pool();
    let lp = h.lp_balance(ALICE);
    h.ledger
        .approve(addr(POOL), addr(ALICE), addr(BOB), units(1_000))
        .unwrap();

    let over = h
        .ledger
        .transfer_from(addr(POOL), addr(BOB), addr(ALICE), addr(BOB), units(1_001));
    assert!(matches!(over, Err(PoolError::InsufficientBalance { .. })));

    h.ledger
        .transfer_from(addr(POOL), addr(BOB), addr(ALICE), addr(BOB), units(1_000))
        .unwrap();
    assert_eq!(h.lp_balance(BOB), units(1_000));
    assert_eq!(h.lp_balance(ALICE), lp - units(1_000));

    let out = h
        .call(BOB, |pool, ctx| {
            pool.remove_liquidity(ctx, units(1_000), &[U256::zero(); 2], None)
        })
        .unwrap();
    assert_eq!(out, vec![units(500), units(500)]);
}

#[test]
fn test_rollback_truncates_event_log() {
    let mut h = balanced_pool();
    h.fund(BOB, &[units(300), U256::zero()]);
    let seeded = h.pool.events().len();

    h.call(BOB, |pool, ctx| pool.exchange(ctx, 0, 1, units(100), U256::zero(), None))
        .unwrap();
    assert_eq!(h.pool.events().len(), seeded + 1);

    let err = h
        .call(BOB, |pool, ctx| pool.exchange(ctx, 0, 1, units(100), units(100), None))
        .unwrap_err();
    assert!(matches!(err, PoolError::SlippageExceeded { .. }));
    assert_eq!(h.pool.events().len(), seeded + 1);
    assert_eq!(
        h.pool.events().last().map(|e| e.event_type),
        Some(PoolEventType::TokenExchange)
    );

    h.pool.drain_events();
    let err = h
        .call(BOB, |pool, ctx| pool.exchange(ctx, 0, 1, units(100), units(100), None))
        .unwrap_err();
    assert!(matches!(err, PoolError::SlippageExceeded { .. }));
    assert!(h.pool.events().is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_exchange_output_falls_as_fee_rises(
        fee_low in 0u64..400_000_000,
        step in 1_000_000u64..100_000_000,
        dx in 1_000u64..200_000,
    ) {
        let quote = |fee: u64| {
            let mut h = Harness::plain(&[18, 18], 2000, fee);
            h.seed(ALICE, &[units(1_000_000), units(1_000_000)]);
            h.fund(BOB, &[units(dx), U256::zero()]);
            h.call(BOB, |pool, ctx| pool.exchange(ctx, 0, 1, units(dx), U256::zero(), None))
                .unwrap()
        };
        let cheap = quote(fee_low);
        let dear = quote(fee_low + step);
        prop_assert!(dear < cheap, "fee {} -> {}, fee {} -> {}", fee_low, cheap, fee_low + step, dear);
    }
}
