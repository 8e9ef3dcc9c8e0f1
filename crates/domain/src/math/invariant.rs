//! Newton solvers for the StableSwap invariant.
//!
//! All balances are normalized to 1e18 precision (`xp`) and the
//! amplification is passed in its precise form, `A * A_PRECISION`.
//!
//! The invariant ties `n` balances `x_i` with sum `S` and product `P` to a
//! single value `D`:
//!
//! `A * n^n * S + D = A * D * n^n + D^(n+1) / (n^n * P)`

use super::fixed_point::{CheckedMath, PRECISION};
use crate::error::{PoolError, PoolResult};
use primitive_types::U256;

/// Scale applied to the amplification coefficient.
pub const A_PRECISION: u64 = 100;

/// Hard ceiling on Newton iterations before a solver gives up.
pub const MAX_ITERATIONS: usize = 255;

fn a_precision() -> U256 {
    U256::from(A_PRECISION)
}

fn converged(a: U256, b: U256) -> bool {
    super::fixed_point::abs_diff(a, b) <= U256::one()
}

/// Solves for the invariant `D` given normalized balances.
///
/// Returns zero for an empty pool. A zero balance next to non-zero ones has
/// no solution and is reported as [`PoolError::DivisionByZero`].
pub fn get_d(xp: &[U256], amp: U256) -> PoolResult<U256> {
    let n = U256::from(xp.len());
    let mut s = U256::zero();
    for x in xp {
        s = s.safe_add(*x)?;
    }
    if s.is_zero() {
        return Ok(U256::zero());
    }

    let ann = amp.safe_mul(n)?;
    let mut d = s;

    for _ in 0..MAX_ITERATIONS {
        let mut d_p = d;
        for x in xp {
            d_p = d_p.mul_div(d, x.safe_mul(n)?)?;
        }
        let d_prev = d;

        let numerator = ann
            .mul_div(s, a_precision())?
            .safe_add(d_p.safe_mul(n)?)?
            .safe_mul(d)?;
        let denominator = ann
            .safe_sub(a_precision())?
            .mul_div(d, a_precision())?
            .safe_add(n.safe_add(U256::one())?.safe_mul(d_p)?)?;
        d = numerator.safe_div(denominator)?;

        if converged(d, d_prev) {
            return Ok(d);
        }
    }

    Err(PoolError::ConvergenceFailure("get_D"))
}

/// Solves for the balance of coin `j` once coin `i` is set to `x`, keeping
/// `D` constant.
///
/// `d` may be supplied when the caller already holds the invariant for `xp`.
pub fn get_y(
    i: usize,
    j: usize,
    x: U256,
    xp: &[U256],
    amp: U256,
    d: Option<U256>,
) -> PoolResult<U256> {
    let n_coins = xp.len();
    for index in [i, j] {
        if index >= n_coins {
            return Err(PoolError::InvalidCoinIndex { index, n_coins });
        }
    }
    if i == j {
        return Err(PoolError::InvalidCoinIndex { index: j, n_coins });
    }

    let d = match d {
        Some(d) => d,
        None => get_d(xp, amp)?,
    };
    let n = U256::from(n_coins);
    let ann = amp.safe_mul(n)?;

    let mut c = d;
    let mut s = U256::zero();
    for (k, balance) in xp.iter().enumerate() {
        let x_k = if k == i {
            x
        } else if k != j {
            *balance
        } else {
            continue;
        };
        s = s.safe_add(x_k)?;
        c = c.mul_div(d, x_k.safe_mul(n)?)?;
    }

    solve_y(c, s, d, ann, n, "get_y")
}

/// Solves for the balance of coin `i` that satisfies the invariant at `d`,
/// with every other balance held fixed.
pub fn get_y_d(amp: U256, i: usize, xp: &[U256], d: U256) -> PoolResult<U256> {
    let n_coins = xp.len();
    if i >= n_coins {
        return Err(PoolError::InvalidCoinIndex { index: i, n_coins });
    }
    let n = U256::from(n_coins);
    let ann = amp.safe_mul(n)?;

    let mut c = d;
    let mut s = U256::zero();
    for (k, x_k) in xp.iter().enumerate() {
        if k == i {
            continue;
        }
        s = s.safe_add(*x_k)?;
        c = c.mul_div(d, x_k.safe_mul(n)?)?;
    }

    solve_y(c, s, d, ann, n, "get_y_D")
}

/// Shared Newton step for `y^2 + (b - D) * y = c`.
fn solve_y(
    c: U256,
    s: U256,
    d: U256,
    ann: U256,
    n: U256,
    label: &'static str,
) -> PoolResult<U256> {
    let c = c.safe_mul(d)?.mul_div(a_precision(), ann.safe_mul(n)?)?;
    let b = s.safe_add(d.mul_div(a_precision(), ann)?)?;

    let mut y = d;
    for _ in 0..MAX_ITERATIONS {
        let y_prev = y;
        let numerator = y.safe_mul(y)?.safe_add(c)?;
        let denominator = y
            .safe_mul(U256::from(2u64))?
            .safe_add(b)?
            .safe_sub(d)?;
        y = numerator.safe_div(denominator)?;
        if converged(y, y_prev) {
            return Ok(y);
        }
    }

    Err(PoolError::ConvergenceFailure(label))
}

/// Marginal price of every coin `k >= 1` in units of coin 0, scaled by 1e18.
///
/// The returned vector has `n - 1` entries; entry `k - 1` belongs to coin `k`.
pub fn get_p(xp: &[U256], amp: U256, d: U256) -> PoolResult<Vec<U256>> {
    let n_coins = xp.len();
    if n_coins < 2 {
        return Err(PoolError::LengthMismatch {
            expected: 2,
            actual: n_coins,
        });
    }
    let n = U256::from(n_coins);
    let ann = amp.safe_mul(n)?;

    let mut n_pow_n = U256::one();
    for _ in 0..n_coins {
        n_pow_n = n_pow_n.safe_mul(n)?;
    }
    let mut d_r = d.safe_div(n_pow_n)?;
    for x in xp {
        d_r = d_r.mul_div(d, *x)?;
    }

    let xp0_a = ann.mul_div(xp[0], a_precision())?;
    let denominator = xp0_a.safe_add(d_r)?;

    xp[1..]
        .iter()
        .map(|x| {
            PRECISION
                .safe_mul(xp0_a.safe_add(d_r.mul_div(xp[0], *x)?)?)?
                .safe_div(denominator)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::fixed_point::abs_diff;

    fn e18(v: u64) -> U256 {
        U256::from(v) * PRECISION
    }

    fn amp(a: u64) -> U256 {
        U256::from(a * A_PRECISION)
    }

    #[test]
    fn test_get_d_empty_pool() {
        assert_eq!(get_d(&[U256::zero(), U256::zero()], amp(100)).unwrap(), U256::zero());
    }

    #[test]
    fn test_get_d_balanced_equals_sum() {
        let xp = vec![e18(1_000_000); 3];
        assert_eq!(get_d(&xp, amp(2000)).unwrap(), e18(3_000_000));
    }

    #[test]
    fn test_get_d_imbalanced_between_sum_and_product_bound() {
        let xp = [e18(1_500_000), e18(500_000)];
        let d = get_d(&xp, amp(100)).unwrap();
        // D sits below the sum and approaches it as A grows.
        assert!(d < e18(2_000_000));
        let d_high = get_d(&xp, amp(10_000)).unwrap();
        assert!(d_high > d);
        assert!(d_high < e18(2_000_000));
    }

    #[test]
    fn test_get_d_zero_balance_fails() {
        let xp = [e18(10), U256::zero()];
        assert_eq!(get_d(&xp, amp(100)), Err(PoolError::DivisionByZero));
    }

    #[test]
    fn test_get_y_preserves_invariant() {
        let xp = [e18(1_000_000), e18(1_200_000), e18(900_000)];
        let a = amp(500);
        let d = get_d(&xp, a).unwrap();
        let x = xp[0] + e18(50_000);
        let y = get_y(0, 2, x, &xp, a, None).unwrap();
        assert!(y < xp[2]);

        let moved = [x, xp[1], y];
        let d_after = get_d(&moved, a).unwrap();
        assert!(abs_diff(d_after, d) <= U256::from(4u64));
    }

    #[test]
    fn test_get_y_accepts_cached_d() {
        let xp = [e18(500), e18(700)];
        let a = amp(200);
        let d = get_d(&xp, a).unwrap();
        let x = e18(510);
        assert_eq!(
            get_y(0, 1, x, &xp, a, Some(d)).unwrap(),
            get_y(0, 1, x, &xp, a, None).unwrap()
        );
    }

    #[test]
    fn test_get_y_rejects_bad_indices() {
        let xp = [e18(1), e18(1)];
        assert_eq!(
            get_y(1, 1, e18(1), &xp, amp(100), None),
            Err(PoolError::InvalidCoinIndex {
                index: 1,
                n_coins: 2
            })
        );
        assert_eq!(
            get_y(0, 2, e18(1), &xp, amp(100), None),
            Err(PoolError::InvalidCoinIndex {
                index: 2,
                n_coins: 2
            })
        );
    }

    #[test]
    fn test_get_y_d_recovers_balance() {
        let xp = [e18(1_000), e18(3_000), e18(2_000)];
        let a = amp(1000);
        let d = get_d(&xp, a).unwrap();
        let y = get_y_d(a, 1, &xp, d).unwrap();
        assert!(abs_diff(y, xp[1]) <= U256::from(2u64));
    }

    #[test]
    fn test_get_y_d_lower_invariant_lowers_balance() {
        let xp = [e18(1_000), e18(1_000)];
        let a = amp(100);
        let d = get_d(&xp, a).unwrap();
        let y = get_y_d(a, 0, &xp, d - e18(100)).unwrap();
        assert!(y < xp[0]);
    }

    #[test]
    fn test_get_p_balanced_is_par() {
        let xp = vec![e18(1_000_000); 2];
        let a = amp(2000);
        let d = get_d(&xp, a).unwrap();
        assert_eq!(get_p(&xp, a, d).unwrap(), vec![PRECISION]);

        let xp3 = vec![e18(5_000); 3];
        let d3 = get_d(&xp3, a).unwrap();
        for p in get_p(&xp3, a, d3).unwrap() {
            assert!(abs_diff(p, PRECISION) <= U256::from(1u64));
        }
    }

    #[test]
    fn test_get_p_abundant_coin_is_cheaper() {
        let xp = [e18(1_000_000), e18(1_300_000)];
        let a = amp(100);
        let d = get_d(&xp, a).unwrap();
        let p = get_p(&xp, a, d).unwrap();
        assert_eq!(p.len(), 1);
        assert!(p[0] < PRECISION);

        let flipped = [xp[1], xp[0]];
        let p_flipped = get_p(&flipped, a, d).unwrap();
        assert!(p_flipped[0] > PRECISION);
    }
}
