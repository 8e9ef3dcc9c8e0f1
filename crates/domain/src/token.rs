use primitive_types::{H160, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a coin's balance is turned into a normalized, rate-adjusted amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AssetType {
    /// Fixed decimal normalization.
    #[default]
    Standard,
    /// Rate read from an external oracle on every call.
    OraclePriced,
    /// Balance changes on its own; custodied balances are re-read each call.
    Rebasing,
    /// Vault share valued through `convert_to_assets`.
    Erc4626Vault,
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetType::Standard => "standard",
            AssetType::OraclePriced => "oracle-priced",
            AssetType::Rebasing => "rebasing",
            AssetType::Erc4626Vault => "erc4626",
        };
        f.write_str(name)
    }
}

/// External rate source for an oracle-priced coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OracleSpec {
    pub target: H160,
    pub selector: [u8; 4],
}

/// Immutable description of one pool coin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoinSpec {
    pub address: H160,
    pub decimals: u8,
    #[serde(default)]
    pub asset_type: AssetType,
    #[serde(default)]
    pub oracle: Option<OracleSpec>,
    /// Decimals of the asset behind an ERC4626 vault share.
    #[serde(default)]
    pub underlying_decimals: Option<u8>,
}

impl CoinSpec {
    pub fn standard(address: H160, decimals: u8) -> Self {
        Self {
            address,
            decimals,
            asset_type: AssetType::Standard,
            oracle: None,
            underlying_decimals: None,
        }
    }

    pub fn rebasing(address: H160, decimals: u8) -> Self {
        Self {
            asset_type: AssetType::Rebasing,
            ..Self::standard(address, decimals)
        }
    }

    pub fn oracle_priced(address: H160, decimals: u8, oracle: OracleSpec) -> Self {
        Self {
            asset_type: AssetType::OraclePriced,
            oracle: Some(oracle),
            ..Self::standard(address, decimals)
        }
    }

    pub fn erc4626(address: H160, decimals: u8, underlying_decimals: u8) -> Self {
        Self {
            asset_type: AssetType::Erc4626Vault,
            underlying_decimals: Some(underlying_decimals),
            ..Self::standard(address, decimals)
        }
    }

    pub fn is_rebasing(&self) -> bool {
        self.asset_type == AssetType::Rebasing
    }

    /// One whole coin in raw units.
    pub fn unit(&self) -> U256 {
        U256::exp10(self.decimals as usize)
    }
}
