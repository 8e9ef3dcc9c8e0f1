use crate::amplification::MAX_A;
use crate::error::{PoolError, PoolResult};
use crate::fees::{
    DEFAULT_ADMIN_FEE, DEFAULT_FEE, DEFAULT_OFFPEG_FEE_MULTIPLIER, FeeSchedule,
};
use crate::oracle::{DEFAULT_D_MA_TIME, DEFAULT_MA_EXP_TIME};
use crate::token::{AssetType, CoinSpec};
use primitive_types::{H160, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Largest number of coins a pool can hold.
pub const MAX_COINS: usize = 8;
/// Highest decimals a pool coin may use.
pub const MAX_DECIMALS: u8 = 18;

fn default_fee() -> U256 {
    U256::from(DEFAULT_FEE)
}

fn default_offpeg() -> U256 {
    U256::from(DEFAULT_OFFPEG_FEE_MULTIPLIER)
}

fn default_admin_fee() -> U256 {
    U256::from(DEFAULT_ADMIN_FEE)
}

fn default_ma_exp_time() -> u64 {
    DEFAULT_MA_EXP_TIME
}

fn default_d_ma_time() -> u64 {
    DEFAULT_D_MA_TIME
}

/// Deployment parameters of a pool, fixed at construction except for the
/// governance-tunable fees, A and oracle windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub name: String,
    pub symbol: String,
    pub coins: Vec<CoinSpec>,
    /// Amplification coefficient in whole units.
    pub a: u64,
    #[serde(default = "default_fee")]
    pub fee: U256,
    #[serde(default = "default_offpeg")]
    pub offpeg_fee_multiplier: U256,
    #[serde(default = "default_admin_fee")]
    pub admin_fee: U256,
    #[serde(default = "default_ma_exp_time")]
    pub ma_exp_time: u64,
    #[serde(default = "default_d_ma_time")]
    pub d_ma_time: u64,
    pub admin: H160,
    pub fee_receiver: H160,
}

impl PoolConfig {
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        coins: Vec<CoinSpec>,
        a: u64,
        admin: H160,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            coins,
            a,
            fee: default_fee(),
            offpeg_fee_multiplier: default_offpeg(),
            admin_fee: default_admin_fee(),
            ma_exp_time: DEFAULT_MA_EXP_TIME,
            d_ma_time: DEFAULT_D_MA_TIME,
            admin,
            fee_receiver: admin,
        }
    }

    pub fn with_fee(mut self, fee: U256) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_offpeg_fee_multiplier(mut self, multiplier: U256) -> Self {
        self.offpeg_fee_multiplier = multiplier;
        self
    }

    pub fn with_admin_fee(mut self, admin_fee: U256) -> Self {
        self.admin_fee = admin_fee;
        self
    }

    pub fn with_oracle_windows(mut self, ma_exp_time: u64, d_ma_time: u64) -> Self {
        self.ma_exp_time = ma_exp_time;
        self.d_ma_time = d_ma_time;
        self
    }

    pub fn with_fee_receiver(mut self, fee_receiver: H160) -> Self {
        self.fee_receiver = fee_receiver;
        self
    }

    pub fn n_coins(&self) -> usize {
        self.coins.len()
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule {
            fee: self.fee,
            offpeg_fee_multiplier: self.offpeg_fee_multiplier,
            admin_fee: self.admin_fee,
        }
    }

    pub fn from_json(json: &str) -> PoolResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PoolError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every deployment constraint.
    pub fn validate(&self) -> PoolResult<()> {
        let n = self.coins.len();
        if !(2..=MAX_COINS).contains(&n) {
            return Err(PoolError::InvalidConfiguration(format!(
                "pool needs 2..={MAX_COINS} coins, got {n}"
            )));
        }

        let mut seen = HashSet::with_capacity(n);
        for coin in &self.coins {
            if coin.decimals > MAX_DECIMALS {
                return Err(PoolError::InvalidConfiguration(format!(
                    "coin {:?} has {} decimals",
                    coin.address, coin.decimals
                )));
            }
            if !seen.insert(coin.address) {
                return Err(PoolError::InvalidConfiguration(format!(
                    "duplicate coin {:?}",
                    coin.address
                )));
            }
            match coin.asset_type {
                AssetType::OraclePriced if coin.oracle.is_none() => {
                    return Err(PoolError::InvalidConfiguration(format!(
                        "oracle-priced coin {:?} has no oracle",
                        coin.address
                    )));
                }
                AssetType::Erc4626Vault
                    if coin.underlying_decimals.is_none_or(|d| d > MAX_DECIMALS) =>
                {
                    return Err(PoolError::InvalidConfiguration(format!(
                        "vault coin {:?} needs underlying decimals <= {MAX_DECIMALS}",
                        coin.address
                    )));
                }
                _ => {}
            }
        }

        if self.a == 0 || self.a >= MAX_A {
            return Err(PoolError::InvalidConfiguration(format!(
                "A must be in 1..{MAX_A}, got {}",
                self.a
            )));
        }

        self.fee_schedule()
            .validate()
            .map_err(|e| PoolError::InvalidConfiguration(e.to_string()))
    }
}
