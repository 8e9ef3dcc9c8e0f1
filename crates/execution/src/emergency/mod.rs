//! Emergency controls.
//!
//! A pool whose solver fails to converge is halted until an admin resets the
//! breaker. Balanced withdrawals stay available while halted.

mod circuit_breaker;

pub use circuit_breaker::*;
