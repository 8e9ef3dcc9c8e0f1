//! The StableSwap pool engine.
//!
//! [`StableSwapPool`] owns the pool's bookkeeping (stored balances, admin
//! fees, LP supply, fee schedule, amplification ramp and oracle) while coin
//! custody lives in the [`Ledger`](crate::ledger::Ledger) passed through the
//! [`Context`]. Every public mutating operation runs inside
//! [`StableSwapPool::atomically`]: on error the pool state and the ledger are
//! both rolled back.

mod admin;
mod exchange;
mod liquidity;
mod views;

use crate::context::{Context, ViewContext};
use crate::lifecycle::{EventData, EventLog, PoolEvent, PoolEventType};
use crate::rates::{rate_multipliers, stored_rates};
use primitive_types::{H160, U256};
use stableswap_domain::amplification::AmplificationRamp;
use stableswap_domain::fees::FeeSchedule;
use stableswap_domain::math::{CheckedMath, PRECISION, get_p};
use stableswap_domain::oracle::PriceOracle;
use stableswap_domain::pool::PoolConfig;
use stableswap_domain::token::CoinSpec;
use stableswap_domain::{PoolError, PoolResult};
use tracing::{info, warn};

/// How incoming coins reach the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Funding {
    /// Transfer from the caller.
    Pull,
    /// Already sitting in the pool above its stored balance.
    Prefunded,
}

/// Where outgoing coins go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payout {
    Transfer(H160),
    /// Stays with the pool address; only the stored balance is reduced.
    Retain,
}

/// Mutable pool bookkeeping. Cloned as a whole to roll back a failed
/// operation; the event log is kept apart and only truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolState {
    pub(crate) stored_balances: Vec<U256>,
    pub(crate) admin_balances: Vec<U256>,
    pub(crate) total_supply: U256,
    pub(crate) fees: FeeSchedule,
    pub(crate) ramp: AmplificationRamp,
    pub(crate) oracle: PriceOracle,
    pub(crate) admin: Option<H160>,
    pub(crate) future_admin: Option<H160>,
}

/// Saved pool state plus the event log length at the time it was taken.
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    state: PoolState,
    events: usize,
}

/// A plain StableSwap pool. The pool address doubles as its LP token.
#[derive(Debug, Clone)]
pub struct StableSwapPool {
    address: H160,
    name: String,
    symbol: String,
    coins: Vec<CoinSpec>,
    rate_multipliers: Vec<U256>,
    contains_rebasing: bool,
    fee_receiver: H160,
    state: PoolState,
    events: EventLog,
}

impl StableSwapPool {
    /// Deploys a pool at `address` from a validated configuration.
    pub fn new(address: H160, config: PoolConfig, timestamp: u64) -> PoolResult<Self> {
        config.validate()?;
        let n = config.n_coins();
        let rate_multipliers = rate_multipliers(&config.coins)?;
        let contains_rebasing = config.coins.iter().any(CoinSpec::is_rebasing);

        let state = PoolState {
            stored_balances: vec![U256::zero(); n],
            admin_balances: vec![U256::zero(); n],
            total_supply: U256::zero(),
            fees: config.fee_schedule(),
            ramp: AmplificationRamp::new(config.a)?,
            oracle: PriceOracle::new(n, config.ma_exp_time, config.d_ma_time, timestamp),
            admin: Some(config.admin),
            future_admin: None,
        };

        info!(
            pool = ?address,
            name = %config.name,
            n_coins = n,
            a = config.a,
            fee = %config.fee,
            "pool deployed"
        );

        Ok(Self {
            address,
            name: config.name,
            symbol: config.symbol,
            coins: config.coins,
            rate_multipliers,
            contains_rebasing,
            fee_receiver: config.fee_receiver,
            state,
            events: EventLog::default(),
        })
    }

    /// Runs `f` as one atomic unit: pool state and ledger changes are kept
    /// only if it succeeds.
    pub(crate) fn atomically<T>(
        &mut self,
        ctx: &mut Context<'_>,
        operation: &'static str,
        f: impl FnOnce(&mut Self, &mut Context<'_>) -> PoolResult<T>,
    ) -> PoolResult<T> {
        let snapshot = self.snapshot_state();
        let checkpoint = ctx.ledger.checkpoint();
        match f(self, ctx) {
            Ok(value) => {
                ctx.ledger.commit(checkpoint);
                Ok(value)
            }
            Err(err) => {
                self.restore_state(snapshot);
                ctx.ledger.revert(checkpoint);
                warn!(pool = ?self.address, operation, error = %err, "operation rolled back");
                Err(err)
            }
        }
    }

    pub(crate) fn snapshot_state(&self) -> PoolSnapshot {
        PoolSnapshot {
            state: self.state.clone(),
            events: self.events.len(),
        }
    }

    pub(crate) fn restore_state(&mut self, snapshot: PoolSnapshot) {
        self.state = snapshot.state;
        self.events.truncate(snapshot.events);
    }

    pub fn address(&self) -> H160 {
        self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn coins(&self) -> &[CoinSpec] {
        &self.coins
    }

    pub fn n_coins(&self) -> usize {
        self.coins.len()
    }

    pub fn contains_rebasing(&self) -> bool {
        self.contains_rebasing
    }

    pub fn fee_receiver(&self) -> H160 {
        self.fee_receiver
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Hands buffered events to an indexer.
    pub fn drain_events(&mut self) -> Vec<PoolEvent> {
        self.events.drain()
    }

    pub(crate) fn check_index(&self, index: usize) -> PoolResult<()> {
        if index >= self.coins.len() {
            return Err(PoolError::InvalidCoinIndex {
                index,
                n_coins: self.coins.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn check_pair(&self, i: usize, j: usize) -> PoolResult<()> {
        self.check_index(i)?;
        self.check_index(j)?;
        if i == j {
            return Err(PoolError::InvalidCoinIndex {
                index: j,
                n_coins: self.coins.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn check_len(&self, actual: usize) -> PoolResult<()> {
        if actual != self.coins.len() {
            return Err(PoolError::LengthMismatch {
                expected: self.coins.len(),
                actual,
            });
        }
        Ok(())
    }

    pub(crate) fn amp(&self, now: u64) -> U256 {
        self.state.ramp.a_precise(now)
    }

    /// Fresh rates, with the last coin priced at `lp_rate` when given.
    pub(crate) fn rates_with(
        &self,
        view: &ViewContext<'_>,
        lp_rate: Option<U256>,
    ) -> PoolResult<Vec<U256>> {
        stored_rates(&self.coins, &self.rate_multipliers, view.oracle, lp_rate)
    }

    /// Balances owned by LPs: custodied balances net of accrued admin fees.
    ///
    /// A pool holding any rebasing coin re-reads every coin from the ledger,
    /// so rebases and donations accrue to LPs.
    pub(crate) fn balances_mem(&self, view: &ViewContext<'_>) -> PoolResult<Vec<U256>> {
        self.coins
            .iter()
            .enumerate()
            .map(|(i, coin)| {
                let held = if self.contains_rebasing {
                    view.ledger.balance_of(coin.address, self.address)
                } else {
                    self.state.stored_balances[i]
                };
                held.safe_sub(self.state.admin_balances[i])
            })
            .collect()
    }

    /// [`Self::balances_mem`] for a call whose `Prefunded` coins already sit
    /// in the pool: whatever exceeds the stored balance of those coins is
    /// the caller's deposit, not LP property.
    pub(crate) fn balances_before_deposit(
        &self,
        view: &ViewContext<'_>,
        funding: &[(usize, Funding)],
    ) -> PoolResult<Vec<U256>> {
        let mut balances = self.balances_mem(view)?;
        if !self.contains_rebasing {
            return Ok(balances);
        }
        for &(k, f) in funding {
            if f == Funding::Prefunded {
                let held = view.ledger.balance_of(self.coins[k].address, self.address);
                let pending = held.saturating_sub(self.state.stored_balances[k]);
                balances[k] = balances[k].safe_sub(pending)?;
            }
        }
        Ok(balances)
    }

    pub(crate) fn xp_mem(rates: &[U256], balances: &[U256]) -> PoolResult<Vec<U256>> {
        rates
            .iter()
            .zip(balances)
            .map(|(rate, balance)| rate.mul_div(*balance, PRECISION))
            .collect()
    }

    /// Brings `amount` of coin `i` into the pool and returns what actually
    /// arrived, measured on the ledger.
    pub(crate) fn transfer_in(
        &mut self,
        ctx: &mut Context<'_>,
        i: usize,
        amount: U256,
        funding: Funding,
    ) -> PoolResult<U256> {
        let coin = self.coins[i].address;
        let before = ctx.ledger.balance_of(coin, self.address);

        let received = match funding {
            Funding::Prefunded => {
                let excess = before.safe_sub(self.state.stored_balances[i])?;
                if excess < amount {
                    return Err(PoolError::InsufficientBalance {
                        coin,
                        holder: self.address,
                        needed: amount,
                        available: excess,
                    });
                }
                excess
            }
            Funding::Pull => {
                if amount.is_zero() {
                    return Err(PoolError::ZeroAmount);
                }
                ctx.ledger
                    .transfer_from(coin, self.address, ctx.caller, self.address, amount)?;
                ctx.ledger.balance_of(coin, self.address).safe_sub(before)?
            }
        };

        self.state.stored_balances[i] = self.state.stored_balances[i].safe_add(received)?;
        Ok(received)
    }

    /// Sends `amount` of coin `i` out, re-deriving the stored balance from
    /// custody.
    pub(crate) fn transfer_out(
        &mut self,
        ctx: &mut Context<'_>,
        i: usize,
        amount: U256,
        payout: Payout,
    ) -> PoolResult<()> {
        let coin = self.coins[i].address;
        let held = ctx.ledger.balance_of(coin, self.address);
        match payout {
            Payout::Transfer(receiver) => {
                ctx.ledger.transfer(coin, self.address, receiver, amount)?;
                self.state.stored_balances[i] = held.safe_sub(amount)?;
            }
            Payout::Retain => {
                self.state.stored_balances[i] =
                    self.state.stored_balances[i].safe_sub(amount)?;
            }
        }
        Ok(())
    }

    pub(crate) fn mint_lp(&mut self, ctx: &mut Context<'_>, to: H160, amount: U256) -> PoolResult<()> {
        ctx.ledger.mint(self.address, to, amount)?;
        self.state.total_supply = self.state.total_supply.safe_add(amount)?;
        Ok(())
    }

    pub(crate) fn burn_lp(
        &mut self,
        ctx: &mut Context<'_>,
        from: H160,
        amount: U256,
    ) -> PoolResult<()> {
        ctx.ledger.burn(self.address, from, amount)?;
        self.state.total_supply = self.state.total_supply.safe_sub(amount)?;
        Ok(())
    }

    /// Records post-operation spot prices and invariant in the oracle.
    pub(crate) fn upkeep_oracles(
        &mut self,
        xp: &[U256],
        amp: U256,
        d: U256,
        now: u64,
    ) -> PoolResult<()> {
        let spot = get_p(xp, amp, d)?;
        self.state.oracle.upkeep(&spot, d, now)
    }

    pub(crate) fn emit(&mut self, timestamp: u64, event_type: PoolEventType, data: EventData) {
        let event = PoolEvent::new(self.address, timestamp, event_type, data);
        self.events.push(event);
    }
}
