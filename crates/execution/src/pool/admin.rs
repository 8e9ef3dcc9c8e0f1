use super::{Payout, StableSwapPool};
use crate::context::Context;
use crate::lifecycle::{
    AdminFeesData, EventData, FeeData, MaTimeData, OwnershipData, PoolEventType, RampData,
    StopRampData,
};
use primitive_types::{H160, U256};
use stableswap_domain::fees::FeeSchedule;
use stableswap_domain::{PoolError, PoolResult};
use tracing::info;

impl StableSwapPool {
    fn require_admin(&self, caller: H160) -> PoolResult<()> {
        match self.state.admin {
            Some(admin) if admin == caller => Ok(()),
            _ => Err(PoolError::Unauthorized),
        }
    }

    /// Starts a linear ramp of A toward `future_a`, reached at `future_time`.
    pub fn ramp_a(&mut self, ctx: &mut Context<'_>, future_a: u64, future_time: u64) -> PoolResult<()> {
        self.atomically(ctx, "ramp_a", |pool, ctx| {
            pool.require_admin(ctx.caller)?;
            pool.state.ramp.ramp(future_a, future_time, ctx.timestamp)?;

            let ramp = pool.state.ramp;
            pool.emit(
                ctx.timestamp,
                PoolEventType::RampA,
                EventData::Ramp(RampData {
                    old_a: ramp.initial_a_precise(),
                    new_a: ramp.future_a_precise(),
                    initial_time: ramp.initial_time(),
                    future_time: ramp.future_time(),
                }),
            );
            info!(pool = ?pool.address, future_a, future_time, "ramp A started");
            Ok(())
        })
    }

    /// Freezes A at its current value.
    pub fn stop_ramp_a(&mut self, ctx: &mut Context<'_>) -> PoolResult<()> {
        self.atomically(ctx, "stop_ramp_a", |pool, ctx| {
            pool.require_admin(ctx.caller)?;
            let a = pool.state.ramp.stop(ctx.timestamp);
            pool.emit(
                ctx.timestamp,
                PoolEventType::StopRampA,
                EventData::StopRamp(StopRampData {
                    a,
                    time: ctx.timestamp,
                }),
            );
            info!(pool = ?pool.address, a = %a, "ramp A stopped");
            Ok(())
        })
    }

    /// Replaces the swap fee and off-peg multiplier. Takes effect at once.
    pub fn set_new_fee(
        &mut self,
        ctx: &mut Context<'_>,
        fee: U256,
        offpeg_fee_multiplier: U256,
    ) -> PoolResult<()> {
        self.atomically(ctx, "set_new_fee", |pool, ctx| {
            pool.require_admin(ctx.caller)?;
            FeeSchedule::validate_swap_fee(fee, offpeg_fee_multiplier)?;
            pool.state.fees.fee = fee;
            pool.state.fees.offpeg_fee_multiplier = offpeg_fee_multiplier;
            pool.emit_fee(ctx.timestamp, PoolEventType::ApplyNewFee);
            info!(pool = ?pool.address, fee = %fee, offpeg = %offpeg_fee_multiplier, "fee updated");
            Ok(())
        })
    }

    /// Replaces the admin share of collected fees.
    pub fn set_new_admin_fee(&mut self, ctx: &mut Context<'_>, admin_fee: U256) -> PoolResult<()> {
        self.atomically(ctx, "set_new_admin_fee", |pool, ctx| {
            pool.require_admin(ctx.caller)?;
            FeeSchedule::validate_admin_fee(admin_fee)?;
            pool.state.fees.admin_fee = admin_fee;
            pool.emit_fee(ctx.timestamp, PoolEventType::NewFee);
            info!(pool = ?pool.address, admin_fee = %admin_fee, "admin fee updated");
            Ok(())
        })
    }

    fn emit_fee(&mut self, timestamp: u64, event_type: PoolEventType) {
        let fees = self.state.fees;
        self.emit(
            timestamp,
            event_type,
            EventData::Fee(FeeData {
                fee: fees.fee,
                offpeg_fee_multiplier: fees.offpeg_fee_multiplier,
                admin_fee: fees.admin_fee,
            }),
        );
    }

    /// Replaces both oracle windows, in seconds.
    pub fn set_ma_exp_time(
        &mut self,
        ctx: &mut Context<'_>,
        ma_exp_time: u64,
        d_ma_time: u64,
    ) -> PoolResult<()> {
        self.atomically(ctx, "set_ma_exp_time", |pool, ctx| {
            pool.require_admin(ctx.caller)?;
            pool.state.oracle.set_windows(ma_exp_time, d_ma_time)?;
            pool.emit(
                ctx.timestamp,
                PoolEventType::SetNewMaTime,
                EventData::MaTime(MaTimeData {
                    ma_exp_time,
                    d_ma_time,
                }),
            );
            info!(pool = ?pool.address, ma_exp_time, d_ma_time, "oracle windows updated");
            Ok(())
        })
    }

    /// Pays accrued admin fees to the fee receiver and zeroes them.
    pub fn withdraw_admin_fees(&mut self, ctx: &mut Context<'_>) -> PoolResult<Vec<U256>> {
        self.atomically(ctx, "withdraw_admin_fees", |pool, ctx| {
            pool.require_admin(ctx.caller)?;
            let receiver = pool.fee_receiver;
            let amounts = pool.state.admin_balances.clone();
            for (i, amount) in amounts.iter().enumerate() {
                if amount.is_zero() {
                    continue;
                }
                pool.transfer_out(ctx, i, *amount, Payout::Transfer(receiver))?;
                pool.state.admin_balances[i] = U256::zero();
            }

            pool.emit(
                ctx.timestamp,
                PoolEventType::WithdrawAdminFees,
                EventData::AdminFees(AdminFeesData {
                    receiver,
                    amounts: amounts.clone(),
                }),
            );
            info!(pool = ?pool.address, receiver = ?receiver, "admin fees withdrawn");
            Ok(amounts)
        })
    }

    /// Proposes `new_admin`. Takes effect once they accept.
    pub fn commit_transfer_ownership(
        &mut self,
        ctx: &mut Context<'_>,
        new_admin: H160,
    ) -> PoolResult<()> {
        self.atomically(ctx, "commit_transfer_ownership", |pool, ctx| {
            pool.require_admin(ctx.caller)?;
            pool.state.future_admin = Some(new_admin);
            pool.emit(
                ctx.timestamp,
                PoolEventType::CommitOwnership,
                EventData::Ownership(OwnershipData { admin: new_admin }),
            );
            Ok(())
        })
    }

    /// Completes a pending transfer. Only the proposed admin may call.
    pub fn accept_transfer_ownership(&mut self, ctx: &mut Context<'_>) -> PoolResult<()> {
        self.atomically(ctx, "accept_transfer_ownership", |pool, ctx| {
            if pool.state.future_admin != Some(ctx.caller) {
                return Err(PoolError::Unauthorized);
            }
            pool.state.admin = Some(ctx.caller);
            pool.state.future_admin = None;
            pool.emit(
                ctx.timestamp,
                PoolEventType::ApplyOwnership,
                EventData::Ownership(OwnershipData { admin: ctx.caller }),
            );
            info!(pool = ?pool.address, admin = ?ctx.caller, "ownership transferred");
            Ok(())
        })
    }

    pub fn revert_transfer_ownership(&mut self, ctx: &mut Context<'_>) -> PoolResult<()> {
        self.atomically(ctx, "revert_transfer_ownership", |pool, ctx| {
            pool.require_admin(ctx.caller)?;
            pool.state.future_admin = None;
            Ok(())
        })
    }

    /// Gives up admin rights for good. Every admin operation fails afterwards.
    pub fn renounce_ownership(&mut self, ctx: &mut Context<'_>) -> PoolResult<()> {
        self.atomically(ctx, "renounce_ownership", |pool, ctx| {
            pool.require_admin(ctx.caller)?;
            pool.state.admin = None;
            pool.state.future_admin = None;
            info!(pool = ?pool.address, "ownership renounced");
            Ok(())
        })
    }
}
