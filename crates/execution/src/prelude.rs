//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types from the crate.
//!
//! # Example
//!
//! ```rust
//! use stableswap_execution::prelude::*;
//! ```

// Context
pub use crate::context::{Context, ViewContext};

// Emergency
pub use crate::emergency::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};

// Ledger
pub use crate::ledger::{Checkpoint, InMemoryLedger, Ledger};

// Lifecycle
pub use crate::lifecycle::{
    AdminFeesData, EventData, EventLog, ExchangeData, FeeData, LiquidityData, MaTimeData,
    OwnershipData, PoolEvent, PoolEventType, RampData, RemoveOneData, StopRampData,
};

// Metapools
pub use crate::meta::{BasePool, MetaPool};

// Pools
pub use crate::pool::{Funding, Payout, PoolSnapshot, PoolState, StableSwapPool};

// Rates
pub use crate::rates::{NoRateOracle, RateOracle, StaticRateOracle, rate_multipliers, stored_rates};

// Sync
pub use crate::sync::{PoolEnvironment, SharedPool};

// Domain
pub use stableswap_domain::pool::PoolConfig;
pub use stableswap_domain::token::{AssetType, CoinSpec, OracleSpec};
pub use stableswap_domain::{Address, PoolError, PoolResult, U256};
