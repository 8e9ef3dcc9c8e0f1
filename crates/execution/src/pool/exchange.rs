use super::{Funding, Payout, StableSwapPool};
use crate::context::{Context, ViewContext};
use crate::lifecycle::{EventData, ExchangeData, PoolEventType};
use primitive_types::{H160, U256};
use stableswap_domain::fees::FEE_DENOMINATOR;
use stableswap_domain::math::{CheckedMath, PRECISION, get_d, get_y};
use stableswap_domain::{PoolError, PoolResult};
use tracing::{debug, info};

/// Outcome of a swap against a given normalized state.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SwapQuote {
    /// New normalized balance of the input coin.
    pub x: U256,
    /// New normalized balance of the output coin.
    pub y: U256,
    /// Raw amount paid out, net of fees.
    pub dy: U256,
    /// Raw amount of the output coin credited to the admin.
    pub admin_fee: U256,
    /// Invariant before the swap.
    pub d: U256,
}

impl StableSwapPool {
    /// Prices a swap of `dx` raw units of coin `i` into coin `j`.
    pub(crate) fn quote_swap(
        &self,
        xp: &[U256],
        rates: &[U256],
        amp: U256,
        i: usize,
        j: usize,
        dx: U256,
    ) -> PoolResult<SwapQuote> {
        let x = xp[i].safe_add(dx.mul_div(rates[i], PRECISION)?)?;
        let d = get_d(xp, amp)?;
        let y = get_y(i, j, x, xp, amp, Some(d))?;

        // One wei is held back against rounding in the solver.
        let dy = xp[j]
            .checked_sub(y)
            .and_then(|v| v.checked_sub(U256::one()))
            .ok_or(PoolError::ZeroAmount)?;

        let fees = &self.state.fees;
        let two = U256::from(2u64);
        let fee_rate = fees.dynamic_fee(xp[i].safe_add(x)? / two, xp[j].safe_add(y)? / two)?;
        let dy_fee = dy.mul_div(fee_rate, U256::from(FEE_DENOMINATOR))?;
        let payout = dy.safe_sub(dy_fee)?.mul_div(PRECISION, rates[j])?;
        let admin_fee = fees.admin_share(dy_fee)?.mul_div(PRECISION, rates[j])?;

        Ok(SwapQuote {
            x,
            y,
            dy: payout,
            admin_fee,
            d,
        })
    }

    /// Swap core shared by plain and metapool routes. Does not emit events.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn exchange_with(
        &mut self,
        ctx: &mut Context<'_>,
        lp_rate: Option<U256>,
        i: usize,
        j: usize,
        dx: U256,
        min_dy: U256,
        funding: Funding,
        payout: Payout,
    ) -> PoolResult<U256> {
        self.check_pair(i, j)?;
        if dx.is_zero() {
            return Err(PoolError::ZeroAmount);
        }

        let (rates, xp) = {
            let view = ctx.view();
            let rates = self.rates_with(&view, lp_rate)?;
            let balances = self.balances_before_deposit(&view, &[(i, funding)])?;
            let xp = Self::xp_mem(&rates, &balances)?;
            (rates, xp)
        };
        let amp = self.amp(ctx.timestamp);

        let received = self.transfer_in(ctx, i, dx, funding)?;
        let quote = self.quote_swap(&xp, &rates, amp, i, j, received)?;
        if quote.dy < min_dy {
            return Err(PoolError::SlippageExceeded {
                bound: min_dy,
                actual: quote.dy,
            });
        }

        self.state.admin_balances[j] = self.state.admin_balances[j].safe_add(quote.admin_fee)?;

        let mut xp_after = xp;
        xp_after[i] = quote.x;
        xp_after[j] = quote.y;
        self.upkeep_oracles(&xp_after, amp, quote.d, ctx.timestamp)?;

        self.transfer_out(ctx, j, quote.dy, payout)?;
        Ok(quote.dy)
    }

    /// Swap with a `TokenExchange` event. Optimistic transfers are refused
    /// when the pool holds a rebasing coin.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn exchange_and_log(
        &mut self,
        ctx: &mut Context<'_>,
        lp_rate: Option<U256>,
        i: usize,
        j: usize,
        dx: U256,
        min_dy: U256,
        receiver: Option<H160>,
        funding: Funding,
    ) -> PoolResult<U256> {
        if funding == Funding::Prefunded && self.contains_rebasing {
            return Err(PoolError::UnsupportedForRebasingPool);
        }
        let receiver = receiver.unwrap_or(ctx.caller);
        let dy = self.exchange_with(ctx, lp_rate, i, j, dx, min_dy, funding, Payout::Transfer(receiver))?;

        self.emit(
            ctx.timestamp,
            PoolEventType::TokenExchange,
            EventData::Exchange(ExchangeData {
                buyer: ctx.caller,
                sold_id: i,
                tokens_sold: dx,
                bought_id: j,
                tokens_bought: dy,
            }),
        );
        info!(
            pool = ?self.address,
            buyer = ?ctx.caller,
            i,
            j,
            dx = %dx,
            dy = %dy,
            "exchange"
        );
        Ok(dy)
    }

    /// Swaps `dx` of coin `i` pulled from the caller for at least `min_dy` of
    /// coin `j`, paid to `receiver` (the caller by default).
    pub fn exchange(
        &mut self,
        ctx: &mut Context<'_>,
        i: usize,
        j: usize,
        dx: U256,
        min_dy: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256> {
        self.atomically(ctx, "exchange", |pool, ctx| {
            pool.exchange_and_log(ctx, None, i, j, dx, min_dy, receiver, Funding::Pull)
        })
    }

    /// Swaps coins already transferred to the pool. The whole balance excess
    /// of coin `i` over its stored balance is used, and must be at least
    /// `dx`. Not available when the pool holds a rebasing coin.
    pub fn exchange_received(
        &mut self,
        ctx: &mut Context<'_>,
        i: usize,
        j: usize,
        dx: U256,
        min_dy: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256> {
        self.atomically(ctx, "exchange_received", |pool, ctx| {
            pool.exchange_and_log(ctx, None, i, j, dx, min_dy, receiver, Funding::Prefunded)
        })
    }

    pub(crate) fn get_dy_with(
        &self,
        view: &ViewContext<'_>,
        lp_rate: Option<U256>,
        i: usize,
        j: usize,
        dx: U256,
    ) -> PoolResult<U256> {
        self.check_pair(i, j)?;
        let rates = self.rates_with(view, lp_rate)?;
        let xp = Self::xp_mem(&rates, &self.balances_mem(view)?)?;
        let quote = self.quote_swap(&xp, &rates, self.amp(view.timestamp), i, j, dx)?;
        debug!(pool = ?self.address, i, j, dx = %dx, dy = %quote.dy, "get_dy");
        Ok(quote.dy)
    }

    /// Amount of coin `j` an exchange of `dx` of coin `i` would pay now.
    pub fn get_dy(&self, view: &ViewContext<'_>, i: usize, j: usize, dx: U256) -> PoolResult<U256> {
        self.get_dy_with(view, None, i, j, dx)
    }

    pub(crate) fn get_dx_with(
        &self,
        view: &ViewContext<'_>,
        lp_rate: Option<U256>,
        i: usize,
        j: usize,
        dy: U256,
    ) -> PoolResult<U256> {
        self.check_pair(i, j)?;
        let rates = self.rates_with(view, lp_rate)?;
        let xp = Self::xp_mem(&rates, &self.balances_mem(view)?)?;
        let amp = self.amp(view.timestamp);
        let d = get_d(&xp, amp)?;

        let fee_denominator = U256::from(FEE_DENOMINATOR);
        let fee_rate = self.state.fees.dynamic_fee(xp[i], xp[j])?;
        let dy_gross = dy
            .mul_div(rates[j], PRECISION)?
            .safe_add(U256::one())?
            .mul_div(fee_denominator, fee_denominator.safe_sub(fee_rate)?)?;
        let y = xp[j]
            .checked_sub(dy_gross)
            .filter(|y| !y.is_zero())
            .ok_or(PoolError::InsufficientLiquidity("requested output exceeds pool balance"))?;

        let x = get_y(j, i, y, &xp, amp, Some(d))?;
        x.safe_sub(xp[i])?.mul_div(PRECISION, rates[i])
    }

    /// Amount of coin `i` needed to receive `dy` of coin `j`.
    pub fn get_dx(&self, view: &ViewContext<'_>, i: usize, j: usize, dy: U256) -> PoolResult<U256> {
        self.get_dx_with(view, None, i, j, dy)
    }
}
