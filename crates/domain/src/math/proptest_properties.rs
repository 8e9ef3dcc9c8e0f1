//! Property-based checks for the invariant solvers.

use proptest::prelude::*;

use super::fixed_point::{PRECISION, abs_diff};
use super::invariant::{A_PRECISION, get_d, get_y};
use primitive_types::U256;

fn wad(units: u64) -> U256 {
    U256::from(units) * PRECISION
}

/// Balances between 1e3 and 1e9 whole coins.
fn balance_strategy() -> impl Strategy<Value = u64> {
    1_000u64..=1_000_000_000u64
}

/// Second-coin balance as tenths of the first, so pools stay within 10x.
fn ratio_strategy() -> impl Strategy<Value = u64> {
    1u64..=100u64
}

/// Amplification in [1, 5000].
fn amplification_strategy() -> impl Strategy<Value = u64> {
    1u64..=5_000u64
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_d_ignores_coin_order(
        a in balance_strategy(),
        rb in ratio_strategy(),
        rc in ratio_strategy(),
        amp in amplification_strategy(),
    ) {
        let b = (a * rb / 10).max(1);
        let c = (a * rc / 10).max(1);
        let amp = U256::from(amp * A_PRECISION);
        let d_abc = get_d(&[wad(a), wad(b), wad(c)], amp).unwrap();
        let d_cab = get_d(&[wad(c), wad(a), wad(b)], amp).unwrap();
        let d_bca = get_d(&[wad(b), wad(c), wad(a)], amp).unwrap();
        prop_assert!(abs_diff(d_abc, d_cab) <= U256::from(2u64));
        prop_assert!(abs_diff(d_abc, d_bca) <= U256::from(2u64));
    }

    #[test]
    fn prop_get_y_keeps_d(
        a in balance_strategy(),
        rb in ratio_strategy(),
        amp in amplification_strategy(),
        trade_bps in 1u64..=1_000u64,
    ) {
        let b = (a * rb / 10).max(1);
        let amp = U256::from(amp * A_PRECISION);
        let xp = [wad(a), wad(b)];
        let d = get_d(&xp, amp).unwrap();

        let x = xp[0] + xp[0] * U256::from(trade_bps) / U256::from(10_000u64);
        let y = get_y(0, 1, x, &xp, amp, Some(d)).unwrap();
        prop_assert!(y < xp[1]);

        let d_after = get_d(&[x, y], amp).unwrap();
        let tolerance = d / U256::from(1_000_000_000_000u64) + U256::from(10u64);
        prop_assert!(
            abs_diff(d_after, d) <= tolerance,
            "D drifted: before={} after={}", d, d_after
        );
    }

    #[test]
    fn prop_get_y_round_trip(
        a in balance_strategy(),
        rb in ratio_strategy(),
        amp in amplification_strategy(),
        trade_bps in 1u64..=1_000u64,
    ) {
        let b = (a * rb / 10).max(1);
        let amp = U256::from(amp * A_PRECISION);
        let xp = [wad(a), wad(b)];
        let d = get_d(&xp, amp).unwrap();

        let x = xp[0] + xp[0] * U256::from(trade_bps) / U256::from(10_000u64);
        let y = get_y(0, 1, x, &xp, amp, Some(d)).unwrap();
        // Put coin 1 back and solve for coin 0 on the same invariant.
        let x_back = get_y(1, 0, xp[1], &[x, y], amp, Some(d)).unwrap();

        let tolerance = xp[0] / U256::from(1_000_000_000_000u64) + U256::from(10u64);
        prop_assert!(
            abs_diff(x_back, xp[0]) <= tolerance,
            "round trip drifted: start={} back={}", xp[0], x_back
        );
    }

    #[test]
    fn prop_d_grows_with_any_balance(
        a in balance_strategy(),
        rb in ratio_strategy(),
        extra in 1u64..=1_000_000u64,
        amp in amplification_strategy(),
    ) {
        let b = (a * rb / 10).max(1);
        let amp = U256::from(amp * A_PRECISION);
        let d = get_d(&[wad(a), wad(b)], amp).unwrap();
        let d_more = get_d(&[wad(a), wad(b) + wad(extra)], amp).unwrap();
        prop_assert!(d_more > d);
    }
}
