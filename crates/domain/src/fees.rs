use crate::error::{PoolError, PoolResult};
use crate::math::CheckedMath;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Fees are expressed as fractions of 1e10.
pub const FEE_DENOMINATOR: u64 = 10_000_000_000;
/// Ceiling on the swap fee: 50%.
pub const MAX_FEE: u64 = 5_000_000_000;

/// Default swap fee, 0.04%.
pub const DEFAULT_FEE: u64 = 4_000_000;
/// Default off-peg multiplier: the fee can grow to 2x when fully imbalanced.
pub const DEFAULT_OFFPEG_FEE_MULTIPLIER: u64 = 20_000_000_000;
/// Default admin share of collected fees, 50%.
pub const DEFAULT_ADMIN_FEE: u64 = 5_000_000_000;

/// Swap fee parameters of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub fee: U256,
    pub offpeg_fee_multiplier: U256,
    pub admin_fee: U256,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            fee: U256::from(DEFAULT_FEE),
            offpeg_fee_multiplier: U256::from(DEFAULT_OFFPEG_FEE_MULTIPLIER),
            admin_fee: U256::from(DEFAULT_ADMIN_FEE),
        }
    }
}

impl FeeSchedule {
    /// Checks the swap fee against [`MAX_FEE`] and the off-peg ceiling.
    pub fn validate_swap_fee(fee: U256, offpeg_fee_multiplier: U256) -> PoolResult<()> {
        if fee > U256::from(MAX_FEE) {
            return Err(PoolError::FeeOutOfRange(fee));
        }
        let ceiling = U256::from(MAX_FEE).safe_mul(U256::from(FEE_DENOMINATOR))?;
        let worst = offpeg_fee_multiplier
            .checked_mul(fee)
            .ok_or(PoolError::FeeOutOfRange(offpeg_fee_multiplier))?;
        if worst > ceiling {
            return Err(PoolError::FeeOutOfRange(offpeg_fee_multiplier));
        }
        Ok(())
    }

    /// The admin share is a fraction of the fee and cannot exceed 100%.
    pub fn validate_admin_fee(admin_fee: U256) -> PoolResult<()> {
        if admin_fee > U256::from(FEE_DENOMINATOR) {
            return Err(PoolError::FeeOutOfRange(admin_fee));
        }
        Ok(())
    }

    pub fn validate(&self) -> PoolResult<()> {
        Self::validate_swap_fee(self.fee, self.offpeg_fee_multiplier)?;
        Self::validate_admin_fee(self.admin_fee)
    }

    /// Fee charged on a trade between two coins whose normalized balances
    /// average `xpi` and `xpj`.
    pub fn dynamic_fee(&self, xpi: U256, xpj: U256) -> PoolResult<U256> {
        dynamic_fee(xpi, xpj, self.fee, self.offpeg_fee_multiplier)
    }

    /// Per-coin fee rate charged on the imbalanced part of a deposit or
    /// withdrawal: `fee * n / (4 * (n - 1))`.
    pub fn base_liquidity_fee(&self, n_coins: usize) -> PoolResult<U256> {
        let n = U256::from(n_coins);
        self.fee
            .mul_div(n, U256::from(4u64).safe_mul(n.safe_sub(U256::one())?)?)
    }

    /// Portion of a collected fee that accrues to the admin.
    pub fn admin_share(&self, fee_amount: U256) -> PoolResult<U256> {
        fee_amount.mul_div(self.admin_fee, U256::from(FEE_DENOMINATOR))
    }
}

/// Off-peg fee curve.
///
/// Equals `fee` when `xpi == xpj` and approaches
/// `fee * offpeg_fee_multiplier / FEE_DENOMINATOR` as either side drains.
pub fn dynamic_fee(
    xpi: U256,
    xpj: U256,
    fee: U256,
    offpeg_fee_multiplier: U256,
) -> PoolResult<U256> {
    let fee_denominator = U256::from(FEE_DENOMINATOR);
    if offpeg_fee_multiplier <= fee_denominator {
        return Ok(fee);
    }

    let sum = xpi.safe_add(xpj)?;
    let sum_sq = sum.safe_mul(sum)?;
    if sum_sq.is_zero() {
        return Ok(fee);
    }
    let balance_term = offpeg_fee_multiplier
        .safe_sub(fee_denominator)?
        .safe_mul(U256::from(4u64))?
        .safe_mul(xpi)?
        .safe_mul(xpj)?
        .safe_div(sum_sq)?;

    offpeg_fee_multiplier.mul_div(fee, balance_term.safe_add(fee_denominator)?)
}
