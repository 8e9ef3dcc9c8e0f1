//! Metapools: a pool whose second coin is the LP share of a base pool.
//!
//! Underlying coin indices run `0..=base_n`: index `0` is the metapool's
//! own coin, index `k >= 1` is coin `k - 1` of the base pool. Operations on
//! underlying coins first deposit into, withdraw from or swap on the base
//! pool and then trade the LP share inside the metapool.

mod base;

pub use base::BasePool;

use crate::context::{Context, ViewContext};
use crate::lifecycle::{EventData, ExchangeData, PoolEventType, RemoveOneData};
use crate::pool::{Funding, Payout, StableSwapPool};
use primitive_types::{H160, U256};
use stableswap_domain::pool::PoolConfig;
use stableswap_domain::{PoolError, PoolResult};
use std::ops::Deref;
use tracing::{info, warn};

/// Coin decimals the base LP share must have.
const LP_DECIMALS: u8 = 18;

/// A two-coin pool pairing its own coin with a base pool's LP share.
///
/// The base pool is passed into every call that needs it: read-only for
/// plain operations, which only price the LP share at the base virtual
/// price, and mutably for underlying operations.
#[derive(Debug, Clone)]
pub struct MetaPool {
    pool: StableSwapPool,
    base_pool: H160,
    base_coins: Vec<H160>,
}

impl Deref for MetaPool {
    type Target = StableSwapPool;

    fn deref(&self) -> &StableSwapPool {
        &self.pool
    }
}

impl MetaPool {
    /// Deploys a metapool on top of `base`.
    pub fn new<B: BasePool>(
        address: H160,
        config: PoolConfig,
        base: &B,
        timestamp: u64,
    ) -> PoolResult<Self> {
        if config.coins.len() != 2 {
            return Err(PoolError::BasePoolIncompatible(format!(
                "metapool needs exactly 2 coins, got {}",
                config.coins.len()
            )));
        }
        let lp_coin = &config.coins[1];
        if lp_coin.address != base.address() {
            return Err(PoolError::BasePoolIncompatible(
                "coin 1 is not the base pool LP share".into(),
            ));
        }
        if lp_coin.decimals != LP_DECIMALS {
            return Err(PoolError::BasePoolIncompatible(format!(
                "base LP share must have {LP_DECIMALS} decimals"
            )));
        }
        let base_coins = base.coins();
        if !(2..=stableswap_domain::pool::MAX_COINS).contains(&base_coins.len()) {
            return Err(PoolError::BasePoolIncompatible(format!(
                "base pool has {} coins",
                base_coins.len()
            )));
        }
        if base_coins.contains(&config.coins[0].address) {
            return Err(PoolError::BasePoolIncompatible(
                "meta coin is also a base pool coin".into(),
            ));
        }

        let pool = StableSwapPool::new(address, config, timestamp)?;
        info!(pool = ?address, base_pool = ?base.address(), "metapool deployed");
        Ok(Self {
            pool,
            base_pool: base.address(),
            base_coins,
        })
    }

    pub fn pool(&self) -> &StableSwapPool {
        &self.pool
    }

    pub fn base_pool(&self) -> H160 {
        self.base_pool
    }

    pub fn base_coins(&self) -> &[H160] {
        &self.base_coins
    }

    /// Number of underlying coins: the meta coin plus every base coin.
    pub fn n_underlying(&self) -> usize {
        self.base_coins.len() + 1
    }

    /// Drains buffered metapool events.
    pub fn drain_events(&mut self) -> Vec<crate::lifecycle::PoolEvent> {
        self.pool.drain_events()
    }

    fn check_base<B: BasePool>(&self, base: &B) -> PoolResult<()> {
        if base.address() != self.base_pool {
            return Err(PoolError::BasePoolIncompatible(format!(
                "expected base pool {:?}, got {:?}",
                self.base_pool,
                base.address()
            )));
        }
        Ok(())
    }

    fn check_underlying_pair(&self, i: usize, j: usize) -> PoolResult<()> {
        let n = self.n_underlying();
        for index in [i, j] {
            if index >= n {
                return Err(PoolError::InvalidCoinIndex { index, n_coins: n });
            }
        }
        if i == j {
            return Err(PoolError::InvalidCoinIndex { index: j, n_coins: n });
        }
        Ok(())
    }

    fn lp_rate<B: BasePool>(&self, view: &ViewContext<'_>, base: &B) -> PoolResult<Option<U256>> {
        self.check_base(base)?;
        Ok(Some(base.get_virtual_price(view)?))
    }

    /// Runs `f` as one atomic unit over both pools and the ledger.
    fn atomically_with_base<B: BasePool, T>(
        &mut self,
        base: &mut B,
        ctx: &mut Context<'_>,
        operation: &'static str,
        f: impl FnOnce(&mut StableSwapPool, &mut B, &mut Context<'_>) -> PoolResult<T>,
    ) -> PoolResult<T> {
        self.check_base(base)?;
        let meta_snapshot = self.pool.snapshot_state();
        let base_snapshot = base.snapshot();
        let checkpoint = ctx.ledger.checkpoint();
        match f(&mut self.pool, base, ctx) {
            Ok(value) => {
                ctx.ledger.commit(checkpoint);
                Ok(value)
            }
            Err(err) => {
                self.pool.restore_state(meta_snapshot);
                base.restore(base_snapshot);
                ctx.ledger.revert(checkpoint);
                warn!(
                    pool = ?self.pool.address(),
                    operation,
                    error = %err,
                    "metapool operation rolled back"
                );
                Err(err)
            }
        }
    }

    // Plain operations, with coin 1 priced at the base virtual price.

    #[allow(clippy::too_many_arguments)]
    pub fn exchange<B: BasePool>(
        &mut self,
        ctx: &mut Context<'_>,
        base: &B,
        i: usize,
        j: usize,
        dx: U256,
        min_dy: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256> {
        let lp_rate = self.lp_rate(&ctx.view(), base)?;
        self.pool.atomically(ctx, "exchange", |pool, ctx| {
            pool.exchange_and_log(ctx, lp_rate, i, j, dx, min_dy, receiver, Funding::Pull)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn exchange_received<B: BasePool>(
        &mut self,
        ctx: &mut Context<'_>,
        base: &B,
        i: usize,
        j: usize,
        dx: U256,
        min_dy: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256> {
        let lp_rate = self.lp_rate(&ctx.view(), base)?;
        self.pool.atomically(ctx, "exchange_received", |pool, ctx| {
            pool.exchange_and_log(ctx, lp_rate, i, j, dx, min_dy, receiver, Funding::Prefunded)
        })
    }

    pub fn add_liquidity<B: BasePool>(
        &mut self,
        ctx: &mut Context<'_>,
        base: &B,
        amounts: &[U256],
        min_mint_amount: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256> {
        let lp_rate = self.lp_rate(&ctx.view(), base)?;
        self.pool.atomically(ctx, "add_liquidity", |pool, ctx| {
            let receiver = receiver.unwrap_or(ctx.caller);
            let funding = [Funding::Pull; 2];
            pool.add_liquidity_with(ctx, lp_rate, amounts, min_mint_amount, receiver, &funding)
        })
    }

    /// Balanced withdrawal. Needs no rates, so the base pool is not consulted.
    pub fn remove_liquidity(
        &mut self,
        ctx: &mut Context<'_>,
        burn_amount: U256,
        min_amounts: &[U256],
        receiver: Option<H160>,
    ) -> PoolResult<Vec<U256>> {
        self.pool.remove_liquidity(ctx, burn_amount, min_amounts, receiver)
    }

    pub fn remove_liquidity_imbalance<B: BasePool>(
        &mut self,
        ctx: &mut Context<'_>,
        base: &B,
        amounts: &[U256],
        max_burn_amount: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256> {
        let lp_rate = self.lp_rate(&ctx.view(), base)?;
        self.pool.atomically(ctx, "remove_liquidity_imbalance", |pool, ctx| {
            pool.remove_liquidity_imbalance_with(ctx, lp_rate, amounts, max_burn_amount, receiver)
        })
    }

    pub fn remove_liquidity_one_coin<B: BasePool>(
        &mut self,
        ctx: &mut Context<'_>,
        base: &B,
        burn_amount: U256,
        i: usize,
        min_received: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256> {
        let lp_rate = self.lp_rate(&ctx.view(), base)?;
        self.pool.atomically(ctx, "remove_liquidity_one_coin", |pool, ctx| {
            pool.remove_liquidity_one_coin_and_log(ctx, lp_rate, burn_amount, i, min_received, receiver)
        })
    }

    pub fn get_dy<B: BasePool>(
        &self,
        view: &ViewContext<'_>,
        base: &B,
        i: usize,
        j: usize,
        dx: U256,
    ) -> PoolResult<U256> {
        self.pool.get_dy_with(view, self.lp_rate(view, base)?, i, j, dx)
    }

    pub fn get_dx<B: BasePool>(
        &self,
        view: &ViewContext<'_>,
        base: &B,
        i: usize,
        j: usize,
        dy: U256,
    ) -> PoolResult<U256> {
        self.pool.get_dx_with(view, self.lp_rate(view, base)?, i, j, dy)
    }

    pub fn calc_token_amount<B: BasePool>(
        &self,
        view: &ViewContext<'_>,
        base: &B,
        amounts: &[U256],
        is_deposit: bool,
    ) -> PoolResult<U256> {
        self.pool
            .calc_token_amount_with(view, self.lp_rate(view, base)?, amounts, is_deposit)
    }

    pub fn calc_withdraw_one_coin<B: BasePool>(
        &self,
        view: &ViewContext<'_>,
        base: &B,
        burn_amount: U256,
        i: usize,
    ) -> PoolResult<U256> {
        Ok(self
            .pool
            .withdraw_one_coin_quote(view, self.lp_rate(view, base)?, burn_amount, i)?
            .dy)
    }

    pub fn get_virtual_price<B: BasePool>(&self, view: &ViewContext<'_>, base: &B) -> PoolResult<U256> {
        self.pool.get_virtual_price_with(view, self.lp_rate(view, base)?)
    }

    pub fn get_p<B: BasePool>(&self, view: &ViewContext<'_>, base: &B, k: usize) -> PoolResult<U256> {
        self.pool.get_p_with(view, self.lp_rate(view, base)?, k)
    }

    pub fn stored_rates<B: BasePool>(&self, view: &ViewContext<'_>, base: &B) -> PoolResult<Vec<U256>> {
        self.pool.rates_with(view, self.lp_rate(view, base)?)
    }

    pub fn dynamic_fee<B: BasePool>(
        &self,
        view: &ViewContext<'_>,
        base: &B,
        i: usize,
        j: usize,
    ) -> PoolResult<U256> {
        self.pool.dynamic_fee_with(view, self.lp_rate(view, base)?, i, j)
    }

    // Governance passes straight through; none of it reads rates.

    pub fn ramp_a(&mut self, ctx: &mut Context<'_>, future_a: u64, future_time: u64) -> PoolResult<()> {
        self.pool.ramp_a(ctx, future_a, future_time)
    }

    pub fn stop_ramp_a(&mut self, ctx: &mut Context<'_>) -> PoolResult<()> {
        self.pool.stop_ramp_a(ctx)
    }

    pub fn set_new_fee(
        &mut self,
        ctx: &mut Context<'_>,
        fee: U256,
        offpeg_fee_multiplier: U256,
    ) -> PoolResult<()> {
        self.pool.set_new_fee(ctx, fee, offpeg_fee_multiplier)
    }

    pub fn set_new_admin_fee(&mut self, ctx: &mut Context<'_>, admin_fee: U256) -> PoolResult<()> {
        self.pool.set_new_admin_fee(ctx, admin_fee)
    }

    pub fn set_ma_exp_time(
        &mut self,
        ctx: &mut Context<'_>,
        ma_exp_time: u64,
        d_ma_time: u64,
    ) -> PoolResult<()> {
        self.pool.set_ma_exp_time(ctx, ma_exp_time, d_ma_time)
    }

    pub fn withdraw_admin_fees(&mut self, ctx: &mut Context<'_>) -> PoolResult<Vec<U256>> {
        self.pool.withdraw_admin_fees(ctx)
    }

    pub fn commit_transfer_ownership(&mut self, ctx: &mut Context<'_>, new_admin: H160) -> PoolResult<()> {
        self.pool.commit_transfer_ownership(ctx, new_admin)
    }

    pub fn accept_transfer_ownership(&mut self, ctx: &mut Context<'_>) -> PoolResult<()> {
        self.pool.accept_transfer_ownership(ctx)
    }

    pub fn revert_transfer_ownership(&mut self, ctx: &mut Context<'_>) -> PoolResult<()> {
        self.pool.revert_transfer_ownership(ctx)
    }

    pub fn renounce_ownership(&mut self, ctx: &mut Context<'_>) -> PoolResult<()> {
        self.pool.renounce_ownership(ctx)
    }

    // Underlying operations.

    /// Swaps between underlying coins. Base-to-base swaps go straight to the
    /// base pool.
    #[allow(clippy::too_many_arguments)]
    pub fn exchange_underlying<B: BasePool>(
        &mut self,
        ctx: &mut Context<'_>,
        base: &mut B,
        i: usize,
        j: usize,
        dx: U256,
        min_dy: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256> {
        self.exchange_underlying_inner(ctx, base, i, j, dx, min_dy, receiver, Funding::Pull)
    }

    /// Like [`MetaPool::exchange_underlying`], spending coins already sent
    /// to the metapool. Refused when the meta coin rebases.
    #[allow(clippy::too_many_arguments)]
    pub fn exchange_underlying_received<B: BasePool>(
        &mut self,
        ctx: &mut Context<'_>,
        base: &mut B,
        i: usize,
        j: usize,
        dx: U256,
        min_dy: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256> {
        if self.pool.coins()[0].is_rebasing() {
            return Err(PoolError::UnsupportedForRebasingPool);
        }
        self.exchange_underlying_inner(ctx, base, i, j, dx, min_dy, receiver, Funding::Prefunded)
    }

    #[allow(clippy::too_many_arguments)]
    fn exchange_underlying_inner<B: BasePool>(
        &mut self,
        ctx: &mut Context<'_>,
        base: &mut B,
        i: usize,
        j: usize,
        dx: U256,
        min_dy: U256,
        receiver: Option<H160>,
        funding: Funding,
    ) -> PoolResult<U256> {
        self.check_underlying_pair(i, j)?;
        if dx.is_zero() {
            return Err(PoolError::ZeroAmount);
        }
        let base_coins = self.base_coins.clone();

        self.atomically_with_base(base, ctx, "exchange_underlying", |pool, base, ctx| {
            let receiver = receiver.unwrap_or(ctx.caller);
            let meta = pool.address();

            let dy = if i > 0 && j > 0 {
                if funding == Funding::Prefunded {
                    // The base pool pulls from the metapool's own holding.
                    require_prefunded(ctx, base_coins[i - 1], meta, dx)?;
                    ctx.ledger.approve(base_coins[i - 1], meta, base.address(), dx)?;
                    ctx.as_caller(meta, |ctx| {
                        base.exchange(ctx, i - 1, j - 1, dx, min_dy, Some(receiver))
                    })?
                } else {
                    base.exchange(ctx, i - 1, j - 1, dx, min_dy, Some(receiver))?
                }
            } else {
                let lp_rate = Some(base.get_virtual_price(&ctx.view())?);

                let (meta_i, meta_funding, meta_dx) = if i == 0 {
                    (0, funding, dx)
                } else {
                    let coin = base_coins[i - 1];
                    match funding {
                        Funding::Prefunded => require_prefunded(ctx, coin, meta, dx)?,
                        Funding::Pull => ctx.ledger.transfer_from(coin, meta, ctx.caller, meta, dx)?,
                    }
                    ctx.ledger.approve(coin, meta, base.address(), dx)?;
                    let mut amounts = vec![U256::zero(); base_coins.len()];
                    amounts[i - 1] = dx;
                    let minted = ctx.as_caller(meta, |ctx| {
                        base.add_liquidity(ctx, &amounts, U256::zero(), Some(meta))
                    })?;
                    (1, Funding::Prefunded, minted)
                };

                if j == 0 {
                    pool.exchange_with(
                        ctx,
                        lp_rate,
                        meta_i,
                        0,
                        meta_dx,
                        min_dy,
                        meta_funding,
                        Payout::Transfer(receiver),
                    )?
                } else {
                    let lp_out = pool.exchange_with(
                        ctx,
                        lp_rate,
                        meta_i,
                        1,
                        meta_dx,
                        U256::zero(),
                        meta_funding,
                        Payout::Retain,
                    )?;
                    ctx.as_caller(meta, |ctx| {
                        base.remove_liquidity_one_coin(ctx, lp_out, j - 1, min_dy, Some(receiver))
                    })?
                }
            };

            pool.emit(
                ctx.timestamp,
                PoolEventType::TokenExchangeUnderlying,
                EventData::Exchange(ExchangeData {
                    buyer: ctx.caller,
                    sold_id: i,
                    tokens_sold: dx,
                    bought_id: j,
                    tokens_bought: dy,
                }),
            );
            info!(
                pool = ?meta,
                buyer = ?ctx.caller,
                i,
                j,
                dx = %dx,
                dy = %dy,
                "exchange_underlying"
            );
            Ok(dy)
        })
    }

    /// Quote for [`MetaPool::exchange_underlying`].
    pub fn get_dy_underlying<B: BasePool>(
        &self,
        view: &ViewContext<'_>,
        base: &B,
        i: usize,
        j: usize,
        dx: U256,
    ) -> PoolResult<U256> {
        self.check_underlying_pair(i, j)?;
        if i > 0 && j > 0 {
            self.check_base(base)?;
            return base.get_dy(view, i - 1, j - 1, dx);
        }
        let lp_rate = self.lp_rate(view, base)?;
        if i == 0 {
            let lp_out = self.pool.get_dy_with(view, lp_rate, 0, 1, dx)?;
            base.calc_withdraw_one_coin(view, lp_out, j - 1)
        } else {
            let mut amounts = vec![U256::zero(); self.base_coins.len()];
            amounts[i - 1] = dx;
            let lp_in = base.calc_token_amount(view, &amounts, true)?;
            self.pool.get_dy_with(view, lp_rate, 1, 0, lp_in)
        }
    }

    /// Amount of underlying coin `i` needed to receive `dy` of underlying
    /// coin `j`. Inverse of [`MetaPool::get_dy_underlying`].
    pub fn get_dx_underlying<B: BasePool>(
        &self,
        view: &ViewContext<'_>,
        base: &B,
        i: usize,
        j: usize,
        dy: U256,
    ) -> PoolResult<U256> {
        self.check_underlying_pair(i, j)?;
        if i > 0 && j > 0 {
            self.check_base(base)?;
            return base.get_dx(view, i - 1, j - 1, dy);
        }
        let lp_rate = self.lp_rate(view, base)?;
        if i == 0 {
            let mut amounts = vec![U256::zero(); self.base_coins.len()];
            amounts[j - 1] = dy;
            let lp_needed = base.calc_token_amount(view, &amounts, false)?;
            self.pool.get_dx_with(view, lp_rate, 0, 1, lp_needed)
        } else {
            let lp_in = self.pool.get_dx_with(view, lp_rate, 1, 0, dy)?;
            base.calc_withdraw_one_coin(view, lp_in, i - 1)
        }
    }

    /// Deposits the meta coin and any base coins in one step.
    /// `amounts[0]` is the meta coin, `amounts[k]` base coin `k - 1`.
    pub fn add_liquidity_underlying<B: BasePool>(
        &mut self,
        ctx: &mut Context<'_>,
        base: &mut B,
        amounts: &[U256],
        min_mint_amount: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256> {
        let n = self.n_underlying();
        if amounts.len() != n {
            return Err(PoolError::LengthMismatch {
                expected: n,
                actual: amounts.len(),
            });
        }
        let base_coins = self.base_coins.clone();

        self.atomically_with_base(base, ctx, "add_liquidity_underlying", |pool, base, ctx| {
            let receiver = receiver.unwrap_or(ctx.caller);
            let meta = pool.address();
            let base_amounts = &amounts[1..];

            let minted = if base_amounts.iter().any(|a| !a.is_zero()) {
                for (coin, amount) in base_coins.iter().zip(base_amounts) {
                    if !amount.is_zero() {
                        ctx.ledger.transfer_from(*coin, meta, ctx.caller, meta, *amount)?;
                        ctx.ledger.approve(*coin, meta, base.address(), *amount)?;
                    }
                }
                ctx.as_caller(meta, |ctx| {
                    base.add_liquidity(ctx, base_amounts, U256::zero(), Some(meta))
                })?
            } else {
                U256::zero()
            };

            let lp_rate = Some(base.get_virtual_price(&ctx.view())?);
            let meta_amounts = [amounts[0], minted];
            let funding = [Funding::Pull, Funding::Prefunded];
            pool.add_liquidity_with(ctx, lp_rate, &meta_amounts, min_mint_amount, receiver, &funding)
        })
    }

    /// Burns metapool LP shares for a single underlying coin.
    pub fn remove_liquidity_one_coin_underlying<B: BasePool>(
        &mut self,
        ctx: &mut Context<'_>,
        base: &mut B,
        burn_amount: U256,
        i: usize,
        min_received: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256> {
        let n = self.n_underlying();
        if i >= n {
            return Err(PoolError::InvalidCoinIndex { index: i, n_coins: n });
        }

        self.atomically_with_base(base, ctx, "remove_liquidity_one_coin_underlying", |pool, base, ctx| {
            let receiver = receiver.unwrap_or(ctx.caller);
            let meta = pool.address();
            let lp_rate = Some(base.get_virtual_price(&ctx.view())?);

            let dy = if i == 0 {
                pool.remove_liquidity_one_coin_with(
                    ctx,
                    lp_rate,
                    burn_amount,
                    0,
                    min_received,
                    Payout::Transfer(receiver),
                )?
            } else {
                let lp_out = pool.remove_liquidity_one_coin_with(
                    ctx,
                    lp_rate,
                    burn_amount,
                    1,
                    U256::zero(),
                    Payout::Retain,
                )?;
                ctx.as_caller(meta, |ctx| {
                    base.remove_liquidity_one_coin(ctx, lp_out, i - 1, min_received, Some(receiver))
                })?
            };

            let token_supply = pool.total_supply();
            pool.emit(
                ctx.timestamp,
                PoolEventType::RemoveLiquidityOne,
                EventData::RemoveOne(RemoveOneData {
                    provider: ctx.caller,
                    token_id: i,
                    token_amount: burn_amount,
                    coin_amount: dy,
                    token_supply,
                }),
            );
            info!(
                pool = ?meta,
                provider = ?ctx.caller,
                i,
                burned = %burn_amount,
                dy = %dy,
                "remove_liquidity_one_coin_underlying"
            );
            Ok(dy)
        })
    }

    /// Quote for [`MetaPool::remove_liquidity_one_coin_underlying`].
    pub fn calc_withdraw_one_coin_underlying<B: BasePool>(
        &self,
        view: &ViewContext<'_>,
        base: &B,
        burn_amount: U256,
        i: usize,
    ) -> PoolResult<U256> {
        let n = self.n_underlying();
        if i >= n {
            return Err(PoolError::InvalidCoinIndex { index: i, n_coins: n });
        }
        let lp_rate = self.lp_rate(view, base)?;
        if i == 0 {
            return Ok(self.pool.withdraw_one_coin_quote(view, lp_rate, burn_amount, 0)?.dy);
        }
        let lp_out = self.pool.withdraw_one_coin_quote(view, lp_rate, burn_amount, 1)?.dy;
        base.calc_withdraw_one_coin(view, lp_out, i - 1)
    }
}

/// Checks that `holder` already holds at least `amount` of `coin`, sent
/// ahead of the call. The metapool keeps no base coins between calls, so its
/// whole balance counts.
fn require_prefunded(ctx: &Context<'_>, coin: H160, holder: H160, amount: U256) -> PoolResult<()> {
    let available = ctx.ledger.balance_of(coin, holder);
    if available < amount {
        return Err(PoolError::InsufficientBalance {
            coin,
            holder,
            needed: amount,
            available,
        });
    }
    Ok(())
}

