//! Stateful StableSwap engine.
//!
//! This crate runs pools on top of the math in `stableswap-domain`:
//! - Execution context, token ledger and rate oracles
//! - Plain pools with swaps, liquidity, fees and governance
//! - Metapools trading a base pool's LP share
//! - Pool events for indexers
//! - Emergency breaker and a lock-guarded handle for async callers

/// Prelude module for convenient imports.
pub mod prelude;

/// Per-call execution context.
pub mod context;
/// Emergency breaker.
pub mod emergency;
/// Token custody.
pub mod ledger;
/// Pool lifecycle events.
pub mod lifecycle;
/// Metapools over a base pool.
pub mod meta;
/// The pool engine.
pub mod pool;
/// Coin rates and rate oracles.
pub mod rates;
/// Shared pool handle.
pub mod sync;
