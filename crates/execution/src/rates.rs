//! Rate derivation for pool coins.
//!
//! Rates are re-derived on every call; nothing here is cached between
//! operations.

use primitive_types::{H160, U256};
use stableswap_domain::math::{CheckedMath, PRECISION, rate_multiplier};
use stableswap_domain::token::{AssetType, CoinSpec};
use stableswap_domain::{PoolError, PoolResult};
use std::collections::HashMap;

/// External rate sources consulted by oracle-priced and vault coins.
pub trait RateOracle {
    /// Calls `selector` on `target` and returns the 1e18-scaled rate.
    fn call_rate(&self, target: H160, selector: [u8; 4]) -> PoolResult<U256>;

    /// ERC4626 `convertToAssets(shares)` on `vault`.
    fn convert_to_assets(&self, vault: H160, shares: U256) -> PoolResult<U256>;
}

/// Oracle for pools without external rate sources. Every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRateOracle;

impl RateOracle for NoRateOracle {
    fn call_rate(&self, target: H160, _selector: [u8; 4]) -> PoolResult<U256> {
        Err(PoolError::OracleCallFailed(format!(
            "no rate source for {target:?}"
        )))
    }

    fn convert_to_assets(&self, vault: H160, _shares: U256) -> PoolResult<U256> {
        Err(PoolError::OracleCallFailed(format!(
            "no rate source for vault {vault:?}"
        )))
    }
}

/// Fixed, settable rate table.
#[derive(Debug, Clone, Default)]
pub struct StaticRateOracle {
    rates: HashMap<(H160, [u8; 4]), U256>,
    /// Raw underlying assets per raw share, scaled by 1e18.
    vault_ratios: HashMap<H160, U256>,
}

impl StaticRateOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rate(&mut self, target: H160, selector: [u8; 4], rate: U256) {
        self.rates.insert((target, selector), rate);
    }

    pub fn set_vault_ratio(&mut self, vault: H160, assets_per_share: U256) {
        self.vault_ratios.insert(vault, assets_per_share);
    }
}

impl RateOracle for StaticRateOracle {
    fn call_rate(&self, target: H160, selector: [u8; 4]) -> PoolResult<U256> {
        self.rates
            .get(&(target, selector))
            .copied()
            .ok_or_else(|| PoolError::OracleCallFailed(format!("call to {target:?} reverted")))
    }

    fn convert_to_assets(&self, vault: H160, shares: U256) -> PoolResult<U256> {
        let ratio = self
            .vault_ratios
            .get(&vault)
            .copied()
            .ok_or_else(|| PoolError::OracleCallFailed(format!("vault {vault:?} reverted")))?;
        shares.mul_div(ratio, PRECISION)
    }
}

/// Decimal normalization multipliers for `coins`.
pub fn rate_multipliers(coins: &[CoinSpec]) -> PoolResult<Vec<U256>> {
    coins.iter().map(|c| rate_multiplier(c.decimals)).collect()
}

/// Fresh rates for every coin.
///
/// `lp_rate` replaces the rate of the last coin with a base pool's virtual
/// price when the pool is a metapool.
pub fn stored_rates(
    coins: &[CoinSpec],
    multipliers: &[U256],
    oracle: &dyn RateOracle,
    lp_rate: Option<U256>,
) -> PoolResult<Vec<U256>> {
    if coins.len() != multipliers.len() {
        return Err(PoolError::LengthMismatch {
            expected: coins.len(),
            actual: multipliers.len(),
        });
    }

    let mut rates = Vec::with_capacity(coins.len());
    for (coin, multiplier) in coins.iter().zip(multipliers) {
        let rate = match coin.asset_type {
            AssetType::Standard | AssetType::Rebasing => *multiplier,
            AssetType::OraclePriced => {
                let spec = coin.oracle.ok_or_else(|| {
                    PoolError::OracleCallFailed(format!("coin {:?} has no oracle", coin.address))
                })?;
                let quote = oracle.call_rate(spec.target, spec.selector)?;
                if quote.is_zero() {
                    return Err(PoolError::OracleCallFailed(format!(
                        "oracle {:?} returned zero",
                        spec.target
                    )));
                }
                multiplier.mul_div(quote, PRECISION)?
            }
            AssetType::Erc4626Vault => {
                let underlying = coin.underlying_decimals.unwrap_or(coin.decimals);
                let assets = oracle.convert_to_assets(coin.address, coin.unit())?;
                if assets.is_zero() {
                    return Err(PoolError::OracleCallFailed(format!(
                        "vault {:?} returned zero assets",
                        coin.address
                    )));
                }
                let scale = U256::exp10(18usize.saturating_sub(underlying as usize));
                multiplier.safe_mul(assets)?.mul_div(scale, PRECISION)?
            }
        };
        rates.push(rate);
    }

    if let (Some(rate), Some(last)) = (lp_rate, rates.last_mut()) {
        *last = rate;
    }
    Ok(rates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stableswap_domain::token::OracleSpec;

    fn addr(v: u64) -> H160 {
        H160::from_low_u64_be(v)
    }

    const SELECTOR: [u8; 4] = [0x07, 0xa2, 0xd1, 0x3a];

    #[test]
    fn test_standard_rates() {
        let coins = vec![CoinSpec::standard(addr(1), 18), CoinSpec::standard(addr(2), 6)];
        let multipliers = rate_multipliers(&coins).unwrap();
        let rates = stored_rates(&coins, &multipliers, &NoRateOracle, None).unwrap();
        assert_eq!(rates, vec![PRECISION, U256::exp10(30)]);
    }

    #[test]
    fn test_oracle_priced_rate() {
        let spec = OracleSpec {
            target: addr(50),
            selector: SELECTOR,
        };
        let coins = vec![
            CoinSpec::standard(addr(1), 18),
            CoinSpec::oracle_priced(addr(2), 18, spec),
        ];
        let multipliers = rate_multipliers(&coins).unwrap();

        let mut oracle = StaticRateOracle::new();
        let quote = U256::from(1_050_000_000_000_000_000u64);
        oracle.set_rate(addr(50), SELECTOR, quote);
        let rates = stored_rates(&coins, &multipliers, &oracle, None).unwrap();
        assert_eq!(rates[1], quote);

        oracle.set_rate(addr(50), SELECTOR, U256::zero());
        assert!(matches!(
            stored_rates(&coins, &multipliers, &oracle, None),
            Err(PoolError::OracleCallFailed(_))
        ));
        assert!(matches!(
            stored_rates(&coins, &multipliers, &NoRateOracle, None),
            Err(PoolError::OracleCallFailed(_))
        ));
    }

    #[test]
    fn test_vault_rate() {
        // 18-decimal shares over a 6-decimal asset, 1 share = 1.05 assets.
        let coins = vec![CoinSpec::standard(addr(1), 18), CoinSpec::erc4626(addr(2), 18, 6)];
        let multipliers = rate_multipliers(&coins).unwrap();
        let mut oracle = StaticRateOracle::new();
        oracle.set_vault_ratio(addr(2), U256::from(1_050_000u64));
        let rates = stored_rates(&coins, &multipliers, &oracle, None).unwrap();
        assert_eq!(rates[1], U256::from(1_050_000_000_000_000_000u64));
    }

    #[test]
    fn test_lp_rate_override() {
        let coins = vec![CoinSpec::standard(addr(1), 18), CoinSpec::standard(addr(2), 18)];
        let multipliers = rate_multipliers(&coins).unwrap();
        let vp = U256::from(1_010_000_000_000_000_000u64);
        let rates = stored_rates(&coins, &multipliers, &NoRateOracle, Some(vp)).unwrap();
        assert_eq!(rates, vec![PRECISION, vp]);
    }
}
