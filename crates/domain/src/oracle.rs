//! Exponential moving average oracle for spot prices and the invariant.
//!
//! Each state-changing pool operation calls [`PriceOracle::upkeep`] with the
//! post-operation spot prices and invariant. The EMA is advanced using the
//! values recorded by the *previous* operation, so a single manipulated
//! trade only enters the average after time has passed.

use crate::error::{PoolError, PoolResult};
use crate::math::{CheckedMath, PRECISION, exp_neg_wad};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default price EMA window, in seconds.
pub const DEFAULT_MA_EXP_TIME: u64 = 866;
/// Default invariant EMA window, in seconds.
pub const DEFAULT_D_MA_TIME: u64 = 62_324;

/// Recorded spot prices are capped at 2.0.
pub fn spot_price_cap() -> U256 {
    PRECISION * U256::from(2u64)
}

/// One EMA step over `dt` seconds with window `window`.
///
/// `ema' = last * (1 - alpha) + ema * alpha`, `alpha = exp(-dt / window)`.
pub fn ema_step(ema: U256, last: U256, dt: u64, window: u64) -> PoolResult<U256> {
    if dt == 0 || window == 0 {
        return Ok(ema);
    }
    let alpha = exp_neg_wad(
        U256::from(dt)
            .safe_mul(PRECISION)?
            .safe_div(U256::from(window))?,
    );
    last.mul_div(PRECISION.safe_sub(alpha)?, PRECISION)?
        .safe_add(ema.mul_div(alpha, PRECISION)?)
}

/// Oracle state. Price vectors hold `n - 1` entries: entry `k` tracks coin
/// `k + 1` priced in coin 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceOracle {
    last_price: Vec<U256>,
    ema_price: Vec<U256>,
    last_d: U256,
    ema_d: U256,
    ma_exp_time: u64,
    d_ma_time: u64,
    price_time: u64,
    d_time: u64,
}

impl PriceOracle {
    /// Fresh oracle at parity. A zero window disables the matching EMA.
    pub fn new(n_coins: usize, ma_exp_time: u64, d_ma_time: u64, now: u64) -> Self {
        let n_prices = n_coins.saturating_sub(1);
        Self {
            last_price: vec![PRECISION; n_prices],
            ema_price: vec![PRECISION; n_prices],
            last_d: U256::zero(),
            ema_d: U256::zero(),
            ma_exp_time,
            d_ma_time,
            price_time: now,
            d_time: now,
        }
    }

    /// Advances both EMAs to `now` and records the new spot prices and
    /// invariant.
    pub fn upkeep(&mut self, spot: &[U256], d: U256, now: u64) -> PoolResult<()> {
        if spot.len() != self.last_price.len() {
            return Err(PoolError::LengthMismatch {
                expected: self.last_price.len(),
                actual: spot.len(),
            });
        }

        if self.price_time < now {
            let dt = now - self.price_time;
            for (ema, last) in self.ema_price.iter_mut().zip(&self.last_price) {
                *ema = ema_step(*ema, *last, dt, self.ma_exp_time)?;
            }
            self.price_time = now;
        }
        let cap = spot_price_cap();
        for (last, p) in self.last_price.iter_mut().zip(spot) {
            // A zero spot carries no price; keep the previous one.
            if !p.is_zero() {
                *last = (*p).min(cap);
            }
        }

        self.advance_d(now)?;
        self.last_d = d;

        debug!(
            ema_d = %self.ema_d,
            last_d = %self.last_d,
            "oracle upkeep"
        );
        Ok(())
    }

    /// Records a pro-rata withdrawal of `burn` out of `supply` LP shares.
    ///
    /// Prices do not move on a balanced withdrawal, so only the invariant
    /// side is touched.
    pub fn record_balanced_removal(
        &mut self,
        burn: U256,
        supply: U256,
        now: u64,
    ) -> PoolResult<()> {
        let removed = self.last_d.mul_div(burn, supply)?;
        self.advance_d(now)?;
        self.last_d = self.last_d.safe_sub(removed)?;
        Ok(())
    }

    /// Seeds both invariant values on the first deposit into an empty pool.
    pub fn seed_d(&mut self, d: U256, now: u64) {
        self.last_d = d;
        self.ema_d = d;
        self.d_time = now;
    }

    fn advance_d(&mut self, now: u64) -> PoolResult<()> {
        if self.d_time < now {
            self.ema_d = ema_step(self.ema_d, self.last_d, now - self.d_time, self.d_ma_time)?;
            self.d_time = now;
        }
        Ok(())
    }

    /// Replaces both windows. Zero is rejected here even though a pool may be
    /// deployed with a disabled oracle.
    pub fn set_windows(&mut self, ma_exp_time: u64, d_ma_time: u64) -> PoolResult<()> {
        if ma_exp_time == 0 || d_ma_time == 0 {
            return Err(PoolError::InvalidConfiguration(
                "oracle windows must be non-zero".into(),
            ));
        }
        self.ma_exp_time = ma_exp_time;
        self.d_ma_time = d_ma_time;
        Ok(())
    }

    fn check_index(&self, k: usize) -> PoolResult<()> {
        if k >= self.last_price.len() {
            return Err(PoolError::InvalidCoinIndex {
                index: k,
                n_coins: self.last_price.len(),
            });
        }
        Ok(())
    }

    pub fn last_price(&self, k: usize) -> PoolResult<U256> {
        self.check_index(k)?;
        Ok(self.last_price[k])
    }

    /// EMA as stored at the last update, without projection to now.
    pub fn ema_price(&self, k: usize) -> PoolResult<U256> {
        self.check_index(k)?;
        Ok(self.ema_price[k])
    }

    /// EMA price projected to `now`.
    pub fn price_oracle(&self, k: usize, now: u64) -> PoolResult<U256> {
        self.check_index(k)?;
        if self.ma_exp_time == 0 {
            return Ok(PRECISION);
        }
        ema_step(
            self.ema_price[k],
            self.last_price[k],
            now.saturating_sub(self.price_time),
            self.ma_exp_time,
        )
    }

    /// EMA invariant projected to `now`.
    pub fn d_oracle(&self, now: u64) -> PoolResult<U256> {
        if self.d_ma_time == 0 {
            return Ok(self.last_d);
        }
        ema_step(
            self.ema_d,
            self.last_d,
            now.saturating_sub(self.d_time),
            self.d_ma_time,
        )
    }

    pub fn last_d(&self) -> U256 {
        self.last_d
    }

    pub fn ema_d(&self) -> U256 {
        self.ema_d
    }

    pub fn ma_exp_time(&self) -> u64 {
        self.ma_exp_time
    }

    pub fn d_ma_time(&self) -> u64 {
        self.d_ma_time
    }

    pub fn price_time(&self) -> u64 {
        self.price_time
    }

    pub fn d_time(&self) -> u64 {
        self.d_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: u64 = 1_700_000_000;

    fn wad_f64(v: U256) -> f64 {
        v.low_u128() as f64 / 1e18
    }

    fn wad(milli: u64) -> U256 {
        U256::from(milli) * U256::exp10(15)
    }

    #[test]
    fn test_new_starts_at_parity() {
        let oracle = PriceOracle::new(3, DEFAULT_MA_EXP_TIME, DEFAULT_D_MA_TIME, T0);
        assert_eq!(oracle.last_price(0).unwrap(), PRECISION);
        assert_eq!(oracle.ema_price(1).unwrap(), PRECISION);
        assert_eq!(oracle.price_oracle(1, T0 + 10_000).unwrap(), PRECISION);
        assert!(oracle.last_price(2).is_err());
    }

    #[test]
    fn test_ema_decay_matches_exponential() {
        let mut oracle = PriceOracle::new(2, DEFAULT_MA_EXP_TIME, DEFAULT_D_MA_TIME, T0);
        let spot = wad(1_010);
        oracle.upkeep(&[spot], wad(2_000), T0).unwrap();

        for dt in [1u64, 60, 866, 3_600, 20_000] {
            let got = wad_f64(oracle.price_oracle(0, T0 + dt).unwrap());
            let w = (-(dt as f64) / DEFAULT_MA_EXP_TIME as f64).exp();
            let want = 1.0 * w + 1.01 * (1.0 - w);
            assert!(
                ((got - want) / want).abs() < 1e-6,
                "dt={dt}: got {got}, want {want}"
            );
        }
    }

    #[test]
    fn test_same_block_updates_do_not_move_ema() {
        let mut oracle = PriceOracle::new(2, DEFAULT_MA_EXP_TIME, DEFAULT_D_MA_TIME, T0);
        oracle.upkeep(&[wad(1_500)], wad(2_000), T0).unwrap();
        oracle.upkeep(&[wad(900)], wad(2_000), T0).unwrap();
        assert_eq!(oracle.ema_price(0).unwrap(), PRECISION);
        assert_eq!(oracle.last_price(0).unwrap(), wad(900));
    }

    #[test]
    fn test_spot_is_capped() {
        let mut oracle = PriceOracle::new(2, DEFAULT_MA_EXP_TIME, DEFAULT_D_MA_TIME, T0);
        oracle.upkeep(&[wad(5_000)], wad(2_000), T0).unwrap();
        assert_eq!(oracle.last_price(0).unwrap(), spot_price_cap());
    }

    #[test]
    fn test_zero_spot_keeps_previous_price() {
        let mut oracle = PriceOracle::new(3, DEFAULT_MA_EXP_TIME, DEFAULT_D_MA_TIME, T0);
        oracle.upkeep(&[wad(1_020), wad(990)], wad(3_000), T0).unwrap();
        oracle
            .upkeep(&[U256::zero(), wad(995)], wad(3_000), T0 + 60)
            .unwrap();
        assert_eq!(oracle.last_price(0).unwrap(), wad(1_020));
        assert_eq!(oracle.last_price(1).unwrap(), wad(995));

        // The EMA keeps converging on the kept price.
        let later = oracle.price_oracle(0, T0 + 60 * DEFAULT_MA_EXP_TIME).unwrap();
        assert_eq!(later, wad(1_020));
    }

    #[test]
    fn test_disabled_windows() {
        let mut oracle = PriceOracle::new(2, 0, 0, T0);
        oracle.upkeep(&[wad(1_200)], wad(3_000), T0).unwrap();
        oracle.upkeep(&[wad(1_300)], wad(3_100), T0 + 1_000).unwrap();
        assert_eq!(oracle.price_oracle(0, T0 + 5_000).unwrap(), PRECISION);
        assert_eq!(oracle.d_oracle(T0 + 5_000).unwrap(), wad(3_100));
        assert!(oracle.set_windows(0, 100).is_err());
        assert!(oracle.set_windows(100, 100).is_ok());
    }

    #[test]
    fn test_seed_and_balanced_removal() {
        let mut oracle = PriceOracle::new(2, DEFAULT_MA_EXP_TIME, DEFAULT_D_MA_TIME, T0);
        oracle.seed_d(wad(2_000_000), T0);
        assert_eq!(oracle.d_oracle(T0 + 100).unwrap(), wad(2_000_000));

        oracle
            .record_balanced_removal(U256::from(1u64), U256::from(4u64), T0)
            .unwrap();
        assert_eq!(oracle.last_d(), wad(1_500_000));
        // Removed liquidity pulls the projected average down over time.
        let later = oracle.d_oracle(T0 + DEFAULT_D_MA_TIME).unwrap();
        assert!(later < wad(2_000_000));
        assert!(later > wad(1_500_000));
    }

    #[test]
    fn test_upkeep_rejects_wrong_length() {
        let mut oracle = PriceOracle::new(3, DEFAULT_MA_EXP_TIME, DEFAULT_D_MA_TIME, T0);
        assert_eq!(
            oracle.upkeep(&[PRECISION], U256::zero(), T0),
            Err(PoolError::LengthMismatch {
                expected: 2,
                actual: 1
            })
        );
    }
}
