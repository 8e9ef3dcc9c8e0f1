use super::{Funding, Payout, StableSwapPool};
use crate::context::{Context, ViewContext};
use crate::lifecycle::{EventData, LiquidityData, PoolEventType, RemoveOneData};
use primitive_types::{H160, U256};
use stableswap_domain::fees::{FEE_DENOMINATOR, dynamic_fee};
use stableswap_domain::math::{CheckedMath, PRECISION, abs_diff, get_d, get_y_d};
use stableswap_domain::{PoolError, PoolResult};
use tracing::{debug, info};

/// Priced single-coin withdrawal.
#[derive(Debug, Clone)]
pub(crate) struct OneCoinWithdrawal {
    /// Raw amount paid out.
    pub dy: U256,
    /// Raw fee withheld from the payout.
    pub fee: U256,
    /// Normalized balances after the withdrawal.
    pub xp: Vec<U256>,
    /// Invariant after the withdrawal.
    pub d: U256,
    pub amp: U256,
}

impl StableSwapPool {
    /// Imbalance fee for moving from `old` to `new` balances, where the
    /// invariant moves from `d0` to `d1`.
    ///
    /// Returns the raw fee per coin and the balances left after charging it.
    fn imbalance_fees(
        &self,
        rates: &[U256],
        old: &[U256],
        new: &[U256],
        d0: U256,
        d1: U256,
    ) -> PoolResult<(Vec<U256>, Vec<U256>)> {
        let n = old.len();
        let fees = &self.state.fees;
        let base_fee = fees.base_liquidity_fee(n)?;
        let ys = d0.safe_add(d1)?.safe_div(U256::from(n))?;
        let fee_denominator = U256::from(FEE_DENOMINATOR);

        let mut charged = Vec::with_capacity(n);
        let mut reduced = Vec::with_capacity(n);
        for k in 0..n {
            let ideal = d1.mul_div(old[k], d0)?;
            let difference = abs_diff(ideal, new[k]);
            let xs = rates[k].mul_div(old[k].safe_add(new[k])?, PRECISION)?;
            let fee_rate = dynamic_fee(xs, ys, base_fee, fees.offpeg_fee_multiplier)?;
            let fee = fee_rate.mul_div(difference, fee_denominator)?;
            reduced.push(new[k].safe_sub(fee)?);
            charged.push(fee);
        }
        Ok((charged, reduced))
    }

    fn credit_admin_fees(&mut self, fees: &[U256]) -> PoolResult<()> {
        for (k, fee) in fees.iter().enumerate() {
            let share = self.state.fees.admin_share(*fee)?;
            self.state.admin_balances[k] = self.state.admin_balances[k].safe_add(share)?;
        }
        Ok(())
    }

    /// Deposit core. `funding[k]` says how coin `k` reaches the pool.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn add_liquidity_with(
        &mut self,
        ctx: &mut Context<'_>,
        lp_rate: Option<U256>,
        amounts: &[U256],
        min_mint_amount: U256,
        receiver: H160,
        funding: &[Funding],
    ) -> PoolResult<U256> {
        self.check_len(amounts.len())?;
        self.check_len(funding.len())?;

        let (rates, old_balances) = {
            let view = ctx.view();
            let pending: Vec<(usize, Funding)> = funding.iter().copied().enumerate().collect();
            (
                self.rates_with(&view, lp_rate)?,
                self.balances_before_deposit(&view, &pending)?,
            )
        };
        let amp = self.amp(ctx.timestamp);
        let d0 = get_d(&Self::xp_mem(&rates, &old_balances)?, amp)?;
        let total_supply = self.state.total_supply;

        let mut new_balances = old_balances.clone();
        for (k, amount) in amounts.iter().enumerate() {
            if amount.is_zero() {
                if total_supply.is_zero() {
                    // The first deposit must seed every coin.
                    return Err(PoolError::ZeroAmount);
                }
                continue;
            }
            let received = self.transfer_in(ctx, k, *amount, funding[k])?;
            new_balances[k] = new_balances[k].safe_add(received)?;
        }

        let d1 = get_d(&Self::xp_mem(&rates, &new_balances)?, amp)?;
        if d1 <= d0 {
            return Err(PoolError::InvariantNotIncreased);
        }

        let (fees, mint_amount, invariant) = if total_supply.is_zero() {
            self.state.oracle.seed_d(d1, ctx.timestamp);
            (vec![U256::zero(); amounts.len()], d1, d1)
        } else {
            let (fees, reduced) = self.imbalance_fees(&rates, &old_balances, &new_balances, d0, d1)?;
            self.credit_admin_fees(&fees)?;
            let xp = Self::xp_mem(&rates, &reduced)?;
            let d2 = get_d(&xp, amp)?;
            let mint_amount = total_supply.mul_div(d2.safe_sub(d0)?, d0)?;
            self.upkeep_oracles(&xp, amp, d2, ctx.timestamp)?;
            (fees, mint_amount, d2)
        };

        if mint_amount < min_mint_amount {
            return Err(PoolError::SlippageExceeded {
                bound: min_mint_amount,
                actual: mint_amount,
            });
        }
        self.mint_lp(ctx, receiver, mint_amount)?;

        let token_supply = self.state.total_supply;
        self.emit(
            ctx.timestamp,
            PoolEventType::AddLiquidity,
            EventData::Liquidity(LiquidityData {
                provider: ctx.caller,
                token_amounts: amounts.to_vec(),
                fees,
                invariant: Some(invariant),
                token_supply,
            }),
        );
        info!(
            pool = ?self.address,
            provider = ?ctx.caller,
            minted = %mint_amount,
            supply = %token_supply,
            "add_liquidity"
        );
        Ok(mint_amount)
    }

    /// Deposits `amounts` pulled from the caller and mints at least
    /// `min_mint_amount` LP shares to `receiver`.
    pub fn add_liquidity(
        &mut self,
        ctx: &mut Context<'_>,
        amounts: &[U256],
        min_mint_amount: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256> {
        let funding = vec![Funding::Pull; self.n_coins()];
        self.atomically(ctx, "add_liquidity", |pool, ctx| {
            let receiver = receiver.unwrap_or(ctx.caller);
            pool.add_liquidity_with(ctx, None, amounts, min_mint_amount, receiver, &funding)
        })
    }

    /// Burns `burn_amount` LP shares for a pro-rata slice of every coin.
    ///
    /// Needs no rates or solver, so it stays available when the pool is
    /// otherwise unusable.
    pub fn remove_liquidity(
        &mut self,
        ctx: &mut Context<'_>,
        burn_amount: U256,
        min_amounts: &[U256],
        receiver: Option<H160>,
    ) -> PoolResult<Vec<U256>> {
        self.atomically(ctx, "remove_liquidity", |pool, ctx| {
            if burn_amount.is_zero() {
                return Err(PoolError::ZeroAmount);
            }
            pool.check_len(min_amounts.len())?;
            let total_supply = pool.state.total_supply;
            if total_supply.is_zero() {
                return Err(PoolError::ZeroTotalSupply);
            }
            let receiver = receiver.unwrap_or(ctx.caller);

            let balances = pool.balances_mem(&ctx.view())?;
            let mut amounts = Vec::with_capacity(balances.len());
            for (balance, min_amount) in balances.iter().zip(min_amounts) {
                let value = balance.mul_div(burn_amount, total_supply)?;
                if value < *min_amount {
                    return Err(PoolError::SlippageExceeded {
                        bound: *min_amount,
                        actual: value,
                    });
                }
                amounts.push(value);
            }

            let provider = ctx.caller;
            pool.burn_lp(ctx, provider, burn_amount)?;
            for (k, value) in amounts.iter().enumerate() {
                pool.transfer_out(ctx, k, *value, Payout::Transfer(receiver))?;
            }
            pool.state
                .oracle
                .record_balanced_removal(burn_amount, total_supply, ctx.timestamp)?;

            let token_supply = pool.state.total_supply;
            pool.emit(
                ctx.timestamp,
                PoolEventType::RemoveLiquidity,
                EventData::Liquidity(LiquidityData {
                    provider,
                    token_amounts: amounts.clone(),
                    fees: Vec::new(),
                    invariant: None,
                    token_supply,
                }),
            );
            info!(
                pool = ?pool.address,
                provider = ?provider,
                burned = %burn_amount,
                supply = %token_supply,
                "remove_liquidity"
            );
            Ok(amounts)
        })
    }

    pub(crate) fn remove_liquidity_imbalance_with(
        &mut self,
        ctx: &mut Context<'_>,
        lp_rate: Option<U256>,
        amounts: &[U256],
        max_burn_amount: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256> {
        self.check_len(amounts.len())?;
        let total_supply = self.state.total_supply;
        if total_supply.is_zero() {
            return Err(PoolError::ZeroTotalSupply);
        }
        let receiver = receiver.unwrap_or(ctx.caller);

        let (rates, old_balances) = {
            let view = ctx.view();
            (
                self.rates_with(&view, lp_rate)?,
                self.balances_mem(&view)?,
            )
        };
        let amp = self.amp(ctx.timestamp);
        let d0 = get_d(&Self::xp_mem(&rates, &old_balances)?, amp)?;

        let mut new_balances = old_balances.clone();
        for (k, amount) in amounts.iter().enumerate() {
            if amount.is_zero() {
                continue;
            }
            new_balances[k] = new_balances[k]
                .checked_sub(*amount)
                .ok_or(PoolError::InsufficientLiquidity("withdrawal exceeds pool balance"))?;
            self.transfer_out(ctx, k, *amount, Payout::Transfer(receiver))?;
        }

        let d1 = get_d(&Self::xp_mem(&rates, &new_balances)?, amp)?;
        let (fees, reduced) = self.imbalance_fees(&rates, &old_balances, &new_balances, d0, d1)?;
        self.credit_admin_fees(&fees)?;
        let xp = Self::xp_mem(&rates, &reduced)?;
        let d2 = get_d(&xp, amp)?;
        self.upkeep_oracles(&xp, amp, d2, ctx.timestamp)?;

        let burn_amount = d0
            .safe_sub(d2)?
            .mul_div(total_supply, d0)?
            .safe_add(U256::one())?;
        if burn_amount <= U256::one() {
            return Err(PoolError::ZeroAmount);
        }
        if burn_amount > max_burn_amount {
            return Err(PoolError::SlippageExceeded {
                bound: max_burn_amount,
                actual: burn_amount,
            });
        }
        let provider = ctx.caller;
        self.burn_lp(ctx, provider, burn_amount)?;

        let token_supply = self.state.total_supply;
        self.emit(
            ctx.timestamp,
            PoolEventType::RemoveLiquidityImbalance,
            EventData::Liquidity(LiquidityData {
                provider,
                token_amounts: amounts.to_vec(),
                fees,
                invariant: Some(d2),
                token_supply,
            }),
        );
        info!(
            pool = ?self.address,
            provider = ?provider,
            burned = %burn_amount,
            supply = %token_supply,
            "remove_liquidity_imbalance"
        );
        Ok(burn_amount)
    }

    /// Withdraws exactly `amounts`, burning at most `max_burn_amount`.
    pub fn remove_liquidity_imbalance(
        &mut self,
        ctx: &mut Context<'_>,
        amounts: &[U256],
        max_burn_amount: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256> {
        self.atomically(ctx, "remove_liquidity_imbalance", |pool, ctx| {
            pool.remove_liquidity_imbalance_with(ctx, None, amounts, max_burn_amount, receiver)
        })
    }

    /// Prices burning `burn_amount` LP shares for coin `i` alone.
    pub(crate) fn withdraw_one_coin_quote(
        &self,
        view: &ViewContext<'_>,
        lp_rate: Option<U256>,
        burn_amount: U256,
        i: usize,
    ) -> PoolResult<OneCoinWithdrawal> {
        self.check_index(i)?;
        if burn_amount.is_zero() {
            return Err(PoolError::ZeroAmount);
        }
        let total_supply = self.state.total_supply;
        if total_supply.is_zero() {
            return Err(PoolError::ZeroTotalSupply);
        }
        if burn_amount > total_supply {
            return Err(PoolError::InsufficientLiquidity("burn exceeds LP supply"));
        }

        let rates = self.rates_with(view, lp_rate)?;
        let balances = self.balances_mem(view)?;
        if burn_amount == total_supply
            && balances
                .iter()
                .enumerate()
                .any(|(k, b)| k != i && !b.is_zero())
        {
            return Err(PoolError::InsufficientLiquidity(
                "entire supply cannot be withdrawn as one coin",
            ));
        }

        let mut xp = Self::xp_mem(&rates, &balances)?;
        let amp = self.amp(view.timestamp);
        let n = U256::from(xp.len());
        let d0 = get_d(&xp, amp)?;
        let d1 = d0.safe_sub(burn_amount.mul_div(d0, total_supply)?)?;
        let new_y = get_y_d(amp, i, &xp, d1)?;

        let fees = &self.state.fees;
        let base_fee = fees.base_liquidity_fee(xp.len())?;
        let ys = d0.safe_add(d1)?.safe_div(n.safe_mul(U256::from(2u64))?)?;
        let fee_denominator = U256::from(FEE_DENOMINATOR);

        let mut xp_reduced = xp.clone();
        for (k, xp_k) in xp.iter().enumerate() {
            let (dx_expected, xavg) = if k == i {
                (
                    xp_k.mul_div(d1, d0)?.safe_sub(new_y)?,
                    xp_k.safe_add(new_y)? / U256::from(2u64),
                )
            } else {
                (xp_k.safe_sub(xp_k.mul_div(d1, d0)?)?, *xp_k)
            };
            let fee_rate = dynamic_fee(xavg, ys, base_fee, fees.offpeg_fee_multiplier)?;
            xp_reduced[k] = xp_k.safe_sub(fee_rate.mul_div(dx_expected, fee_denominator)?)?;
        }

        let dy = xp_reduced[i]
            .safe_sub(get_y_d(amp, i, &xp_reduced, d1)?)?
            .checked_sub(U256::one())
            .ok_or(PoolError::ZeroAmount)?
            .mul_div(PRECISION, rates[i])?;
        let dy_0 = xp[i].safe_sub(new_y)?.mul_div(PRECISION, rates[i])?;
        let fee = dy_0.safe_sub(dy)?;

        xp[i] = new_y;
        Ok(OneCoinWithdrawal {
            dy,
            fee,
            xp,
            d: d1,
            amp,
        })
    }

    /// Single-coin withdrawal core. Does not emit events.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn remove_liquidity_one_coin_with(
        &mut self,
        ctx: &mut Context<'_>,
        lp_rate: Option<U256>,
        burn_amount: U256,
        i: usize,
        min_received: U256,
        payout: Payout,
    ) -> PoolResult<U256> {
        let quote = self.withdraw_one_coin_quote(&ctx.view(), lp_rate, burn_amount, i)?;
        if quote.dy < min_received {
            return Err(PoolError::SlippageExceeded {
                bound: min_received,
                actual: quote.dy,
            });
        }

        let share = self.state.fees.admin_share(quote.fee)?;
        self.state.admin_balances[i] = self.state.admin_balances[i].safe_add(share)?;

        let provider = ctx.caller;
        self.burn_lp(ctx, provider, burn_amount)?;
        self.transfer_out(ctx, i, quote.dy, payout)?;
        self.upkeep_oracles(&quote.xp, quote.amp, quote.d, ctx.timestamp)?;
        Ok(quote.dy)
    }

    pub(crate) fn remove_liquidity_one_coin_and_log(
        &mut self,
        ctx: &mut Context<'_>,
        lp_rate: Option<U256>,
        burn_amount: U256,
        i: usize,
        min_received: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256> {
        let receiver = receiver.unwrap_or(ctx.caller);
        let dy = self.remove_liquidity_one_coin_with(
            ctx,
            lp_rate,
            burn_amount,
            i,
            min_received,
            Payout::Transfer(receiver),
        )?;

        let token_supply = self.state.total_supply;
        self.emit(
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
            pool = ?self.address,
            provider = ?ctx.caller,
            i,
            burned = %burn_amount,
            dy = %dy,
            "remove_liquidity_one_coin"
        );
        Ok(dy)
    }

    /// Burns `burn_amount` LP shares for coin `i` alone.
    pub fn remove_liquidity_one_coin(
        &mut self,
        ctx: &mut Context<'_>,
        burn_amount: U256,
        i: usize,
        min_received: U256,
        receiver: Option<H160>,
    ) -> PoolResult<U256> {
        self.atomically(ctx, "remove_liquidity_one_coin", |pool, ctx| {
            pool.remove_liquidity_one_coin_and_log(ctx, None, burn_amount, i, min_received, receiver)
        })
    }

    pub(crate) fn calc_token_amount_with(
        &self,
        view: &ViewContext<'_>,
        lp_rate: Option<U256>,
        amounts: &[U256],
        is_deposit: bool,
    ) -> PoolResult<U256> {
        self.check_len(amounts.len())?;
        let rates = self.rates_with(view, lp_rate)?;
        let old_balances = self.balances_mem(view)?;
        let amp = self.amp(view.timestamp);
        let d0 = get_d(&Self::xp_mem(&rates, &old_balances)?, amp)?;

        let mut new_balances = old_balances.clone();
        for (balance, amount) in new_balances.iter_mut().zip(amounts) {
            *balance = if is_deposit {
                balance.safe_add(*amount)?
            } else {
                balance
                    .checked_sub(*amount)
                    .ok_or(PoolError::InsufficientLiquidity("withdrawal exceeds pool balance"))?
            };
        }
        let d1 = get_d(&Self::xp_mem(&rates, &new_balances)?, amp)?;

        let total_supply = self.state.total_supply;
        if total_supply.is_zero() {
            return if is_deposit {
                Ok(d1)
            } else {
                Err(PoolError::ZeroTotalSupply)
            };
        }

        let (_, reduced) = self.imbalance_fees(&rates, &old_balances, &new_balances, d0, d1)?;
        let d2 = get_d(&Self::xp_mem(&rates, &reduced)?, amp)?;

        let amount = if is_deposit {
            total_supply.mul_div(d2.safe_sub(d0)?, d0)?
        } else {
            // Matches the burn of `remove_liquidity_imbalance`, rounded up.
            d0.safe_sub(d2)?
                .mul_div(total_supply, d0)?
                .safe_add(U256::one())?
        };
        debug!(pool = ?self.address, is_deposit, amount = %amount, "calc_token_amount");
        Ok(amount)
    }

    /// LP shares minted by depositing, or burned by withdrawing, `amounts`,
    /// imbalance fee included.
    pub fn calc_token_amount(
        &self,
        view: &ViewContext<'_>,
        amounts: &[U256],
        is_deposit: bool,
    ) -> PoolResult<U256> {
        self.calc_token_amount_with(view, None, amounts, is_deposit)
    }

    /// Amount of coin `i` paid for burning `burn_amount` LP shares.
    pub fn calc_withdraw_one_coin(
        &self,
        view: &ViewContext<'_>,
        burn_amount: U256,
        i: usize,
    ) -> PoolResult<U256> {
        Ok(self
            .withdraw_one_coin_quote(view, None, burn_amount, i)?
            .dy)
    }
}
