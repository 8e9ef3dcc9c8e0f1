//! Core StableSwap math and value types.
//!
//! This crate holds everything about a pegged-asset pool that can be
//! computed without touching the outside world:
//! - Checked 256-bit fixed-point helpers
//! - The invariant solver (`D`, `y`, spot price)
//! - The dynamic (off-peg) fee curve
//! - The time-ramped amplification coefficient
//! - The exponential moving average price/invariant oracle
//! - Coin descriptors and pool deployment configuration

/// Time-ramped amplification coefficient.
pub mod amplification;
/// Error taxonomy shared by every pool operation.
pub mod error;
/// Fee constants and the dynamic fee curve.
pub mod fees;
/// Fixed-point helpers and the invariant solver.
pub mod math;
/// EMA price and invariant oracle.
pub mod oracle;
/// Pool deployment configuration.
pub mod pool;
/// Coin descriptors.
pub mod token;

pub use error::{PoolError, PoolResult};
pub use primitive_types::{H160 as Address, U256};
