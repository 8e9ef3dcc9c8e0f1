//! Pool error taxonomy.
//!
//! Every fallible pool operation returns [`PoolError`]. A failed operation
//! is rolled back as a whole, so the error is the only observable effect.

use primitive_types::{H160, U256};
use thiserror::Error;

/// Error raised by a pool operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("invalid coin index {index} for a pool of {n_coins} coins")]
    InvalidCoinIndex { index: usize, n_coins: usize },

    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("slippage exceeded: bound {bound}, actual {actual}")]
    SlippageExceeded { bound: U256, actual: U256 },

    #[error("insufficient balance of {coin:?} held by {holder:?}: needed {needed}, available {available}")]
    InsufficientBalance {
        coin: H160,
        holder: H160,
        needed: U256,
        available: U256,
    },

    #[error("solver did not converge: {0}")]
    ConvergenceFailure(&'static str),

    #[error("operation not supported for pools holding rebasing coins")]
    UnsupportedForRebasingPool,

    #[error("caller is not authorized")]
    Unauthorized,

    #[error("ramp window too short")]
    RampWindowTooShort,

    #[error("ramp target out of bounds")]
    RampBoundsExceeded,

    #[error("fee out of range: {0}")]
    FeeOutOfRange(U256),

    #[error("rate oracle call failed: {0}")]
    OracleCallFailed(String),

    #[error("base pool incompatible: {0}")]
    BasePoolIncompatible(String),

    #[error("arithmetic overflow: {0}")]
    ArithmeticOverflow(&'static str),

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("pool has no LP supply")]
    ZeroTotalSupply,

    #[error("insufficient liquidity: {0}")]
    InsufficientLiquidity(&'static str),

    #[error("invariant did not increase")]
    InvariantNotIncreased,

    #[error("pool is halted after a solver failure")]
    PoolHalted,
}

impl PoolError {
    /// Returns true for failures rooted in pool or environment state rather
    /// than in the caller's parameters.
    ///
    /// Systemic errors are not worth retrying with adjusted parameters.
    #[must_use]
    pub fn is_systemic(&self) -> bool {
        matches!(
            self,
            PoolError::ConvergenceFailure(_)
                | PoolError::OracleCallFailed(_)
                | PoolError::ArithmeticOverflow(_)
                | PoolError::DivisionByZero
                | PoolError::PoolHalted
        )
    }

    /// Returns true for failures the caller can fix by changing the request.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        !self.is_systemic()
    }
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
