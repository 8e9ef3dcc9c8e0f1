//! Token custody abstraction.
//!
//! The pool never keeps its own copy of who owns what. Coin balances and LP
//! shares live in a [`Ledger`], and the pool reads back real balance deltas
//! after every transfer.

mod memory;

pub use memory::InMemoryLedger;

use primitive_types::{H160, U256};
use stableswap_domain::PoolResult;

/// Handle to an open ledger checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(pub(crate) usize);

/// Fungible token balances with nestable checkpoints.
pub trait Ledger {
    fn balance_of(&self, token: H160, holder: H160) -> U256;

    fn total_supply(&self, token: H160) -> U256;

    /// Moves `amount` of `token`. Fails with `InsufficientBalance` when
    /// `from` holds less.
    fn transfer(&mut self, token: H160, from: H160, to: H160, amount: U256) -> PoolResult<()>;

    fn mint(&mut self, token: H160, to: H160, amount: U256) -> PoolResult<()>;

    fn burn(&mut self, token: H160, from: H160, amount: U256) -> PoolResult<()>;

    fn allowance(&self, token: H160, owner: H160, spender: H160) -> U256;

    /// Sets how much of `owner`'s `token` the `spender` may move.
    fn approve(&mut self, token: H160, owner: H160, spender: H160, amount: U256) -> PoolResult<()>;

    /// Moves `amount` of `from`'s `token` on behalf of `spender`, spending
    /// its allowance. An allowance of `U256::MAX` is never decremented.
    /// Fails with `InsufficientBalance` when either the allowance or the
    /// balance falls short.
    fn transfer_from(
        &mut self,
        token: H160,
        spender: H160,
        from: H160,
        to: H160,
        amount: U256,
    ) -> PoolResult<()>;

    /// Opens a checkpoint. Every checkpoint must be closed by exactly one
    /// [`Ledger::revert`] or [`Ledger::commit`], innermost first.
    fn checkpoint(&mut self) -> Checkpoint;

    /// Undoes every change made since `checkpoint` was opened.
    fn revert(&mut self, checkpoint: Checkpoint);

    /// Keeps the changes made since `checkpoint` was opened.
    fn commit(&mut self, checkpoint: Checkpoint);
}
