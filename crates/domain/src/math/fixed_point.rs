use crate::error::{PoolError, PoolResult};
use primitive_types::U256;

/// 1e18, the fixed-point unit shared by rates, prices and normalized balances.
pub const PRECISION: U256 = U256([1_000_000_000_000_000_000, 0, 0, 0]);

/// ln(2) scaled by 1e18.
const LN2_WAD: U256 = U256([693_147_180_559_945_309, 0, 0, 0]);

/// exp(-x) is below one wei once x reaches 42.
const EXP_NEG_CUTOFF: u64 = 42;

/// Checked arithmetic on [`U256`] that reports failures as [`PoolError`].
///
/// All pool math goes through these helpers so that an overflow surfaces as
/// an error instead of a panic.
pub trait CheckedMath: Sized + Copy {
    fn safe_add(self, rhs: Self) -> PoolResult<Self>;
    fn safe_sub(self, rhs: Self) -> PoolResult<Self>;
    fn safe_mul(self, rhs: Self) -> PoolResult<Self>;
    fn safe_div(self, rhs: Self) -> PoolResult<Self>;

    /// `self * mul / div`, with the product kept at full width.
    fn mul_div(self, mul: Self, div: Self) -> PoolResult<Self> {
        self.safe_mul(mul)?.safe_div(div)
    }
}

impl CheckedMath for U256 {
    fn safe_add(self, rhs: Self) -> PoolResult<Self> {
        self.checked_add(rhs)
            .ok_or(PoolError::ArithmeticOverflow("addition"))
    }

    fn safe_sub(self, rhs: Self) -> PoolResult<Self> {
        self.checked_sub(rhs)
            .ok_or(PoolError::ArithmeticOverflow("subtraction underflow"))
    }

    fn safe_mul(self, rhs: Self) -> PoolResult<Self> {
        self.checked_mul(rhs)
            .ok_or(PoolError::ArithmeticOverflow("multiplication"))
    }

    fn safe_div(self, rhs: Self) -> PoolResult<Self> {
        if rhs.is_zero() {
            return Err(PoolError::DivisionByZero);
        }
        Ok(self / rhs)
    }
}

/// Absolute difference of two unsigned values.
#[inline]
pub fn abs_diff(a: U256, b: U256) -> U256 {
    if a > b { a - b } else { b - a }
}

/// Multiplier that lifts a coin with `decimals` decimals to 1e18 precision
/// once the result is divided by [`PRECISION`]: `10^(36 - decimals)`.
pub fn rate_multiplier(decimals: u8) -> PoolResult<U256> {
    if decimals > 36 {
        return Err(PoolError::InvalidConfiguration(format!(
            "coin decimals {decimals} exceed 36"
        )));
    }
    Ok(U256::exp10(36 - decimals as usize))
}

/// `exp(-x)` for `x` scaled by 1e18, result scaled by 1e18.
///
/// The argument is split as `x = k * ln2 + r` with `0 <= r < ln2`, so the
/// Taylor series only ever runs on a small positive remainder and the
/// power of two is applied as a shift. Non-increasing in `x`.
pub fn exp_neg_wad(x: U256) -> U256 {
    if x.is_zero() {
        return PRECISION;
    }
    if x >= U256::from(EXP_NEG_CUTOFF) * PRECISION {
        return U256::zero();
    }

    // x < 42e18 keeps k below 61 and every product below 2^128.
    let k = x / LN2_WAD;
    let r = x - k * LN2_WAD;

    let mut term = PRECISION;
    let mut exp_r = PRECISION;
    for n in 1u64..=48 {
        term = term * r / (PRECISION * U256::from(n));
        if term.is_zero() {
            break;
        }
        exp_r += term;
    }

    (PRECISION * PRECISION / exp_r) >> k.low_u64() as usize
}
