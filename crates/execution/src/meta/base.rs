use crate::context::{Context, ViewContext};
use crate::pool::{PoolSnapshot, StableSwapPool};
use primitive_types::{H160, U256};
use stableswap_domain::PoolResult;

/// A pool whose LP share a metapool can hold as a coin.
///
/// Mutating calls act for `ctx.caller` exactly as a direct call would; the
/// metapool switches the caller to its own address before calling in.
pub trait BasePool {
    /// Saved state used to undo a failed metapool operation.
    type Snapshot;

    /// Pool address, which is also its LP token.
    fn address(&self) -> H160;

    /// Coin addresses in pool order.
    fn coins(&self) -> Vec<H160>;

    fn get_virtual_price(&self, view: &ViewContext<'_>) -> PoolResult<U256>;

    fn get_dy(&self, view: &ViewContext<'_>, i: usize, j: usize, dx: U256) -> PoolResult<U256>;

    fn get_dx(&self, view: &ViewContext<'_>, i: usize, j: usize, dy: U256) -> PoolResult<U256>;

    fn calc_token_amount(
        &self,
        view: &ViewContext<'_>,
        amounts: &[U256],
        is_deposit: bool,
    ) -> PoolResult<U256>;

    fn calc_withdraw_one_coin(
        &self,
        view: &ViewContext<'_>,
        burn_amount: U256,
        i: usize,
    ) -> PoolResult<U256>;

    fn add_liquidity(
        &mut self,
        ctx: &mut Context<'_>,
        amounts: &[U256],
        min_mint_amount: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256>;

    fn remove_liquidity_one_coin(
        &mut self,
        ctx: &mut Context<'_>,
        burn_amount: U256,
        i: usize,
        min_received: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256>;

    fn exchange(
        &mut self,
        ctx: &mut Context<'_>,
        i: usize,
        j: usize,
        dx: U256,
        min_dy: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256>;

    fn snapshot(&self) -> Self::Snapshot;

    fn restore(&mut self, snapshot: Self::Snapshot);
}

impl BasePool for StableSwapPool {
    type Snapshot = PoolSnapshot;

    fn address(&self) -> H160 {
        StableSwapPool::address(self)
    }

    fn coins(&self) -> Vec<H160> {
        StableSwapPool::coins(self).iter().map(|c| c.address).collect()
    }

    fn get_virtual_price(&self, view: &ViewContext<'_>) -> PoolResult<U256> {
        StableSwapPool::get_virtual_price(self, view)
    }

    fn get_dy(&self, view: &ViewContext<'_>, i: usize, j: usize, dx: U256) -> PoolResult<U256> {
        StableSwapPool::get_dy(self, view, i, j, dx)
    }

    fn get_dx(&self, view: &ViewContext<'_>, i: usize, j: usize, dy: U256) -> PoolResult<U256> {
        StableSwapPool::get_dx(self, view, i, j, dy)
    }

    fn calc_token_amount(
        &self,
        view: &ViewContext<'_>,
        amounts: &[U256],
        is_deposit: bool,
    ) -> PoolResult<U256> {
        StableSwapPool::calc_token_amount(self, view, amounts, is_deposit)
    }

    fn calc_withdraw_one_coin(
        &self,
        view: &ViewContext<'_>,
        burn_amount: U256,
        i: usize,
    ) -> PoolResult<U256> {
        StableSwapPool::calc_withdraw_one_coin(self, view, burn_amount, i)
    }

    fn add_liquidity(
        &mut self,
        ctx: &mut Context<'_>,
        amounts: &[U256],
        min_mint_amount: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256> {
        StableSwapPool::add_liquidity(self, ctx, amounts, min_mint_amount, receiver)
    }

    fn remove_liquidity_one_coin(
        &mut self,
        ctx: &mut Context<'_>,
        burn_amount: U256,
        i: usize,
        min_received: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256> {
        StableSwapPool::remove_liquidity_one_coin(self, ctx, burn_amount, i, min_received, receiver)
    }

    fn exchange(
        &mut self,
        ctx: &mut Context<'_>,
        i: usize,
        j: usize,
        dx: U256,
        min_dy: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256> {
        StableSwapPool::exchange(self, ctx, i, j, dx, min_dy, receiver)
    }

    fn snapshot(&self) -> PoolSnapshot {
        self.snapshot_state()
    }

    fn restore(&mut self, snapshot: PoolSnapshot) {
        self.restore_state(snapshot);
    }
}
