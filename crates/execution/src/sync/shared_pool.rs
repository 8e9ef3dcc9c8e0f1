//! Mutex-guarded pool handle for async callers.

use crate::context::{Context, ViewContext};
use crate::emergency::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats};
use crate::ledger::{InMemoryLedger, Ledger};
use crate::lifecycle::PoolEvent;
use crate::pool::StableSwapPool;
use crate::rates::StaticRateOracle;
use chrono::Utc;
use primitive_types::{H160, U256};
use stableswap_domain::{PoolError, PoolResult};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// A pool together with the ledger and rate oracle it runs against.
#[derive(Debug)]
pub struct PoolEnvironment {
    pub pool: StableSwapPool,
    pub ledger: InMemoryLedger,
    pub oracle: StaticRateOracle,
}

/// Cloneable handle that serializes every operation on one pool.
///
/// Each call holds the lock for its whole duration, so at most one
/// operation on the pool is ever in flight. A convergence failure trips the
/// breaker; while it is open only [`SharedPool::remove_liquidity`] and views
/// are served.
#[derive(Clone)]
pub struct SharedPool {
    inner: Arc<Mutex<PoolEnvironment>>,
    breaker: Arc<CircuitBreaker>,
    /// Clock override; wall-clock time when unset.
    pinned_time: Arc<RwLock<Option<u64>>>,
}

impl SharedPool {
    pub fn new(pool: StableSwapPool, ledger: InMemoryLedger, oracle: StaticRateOracle) -> Self {
        Self::with_breaker(pool, ledger, oracle, CircuitBreakerConfig::default())
    }

    pub fn with_breaker(
        pool: StableSwapPool,
        ledger: InMemoryLedger,
        oracle: StaticRateOracle,
        config: CircuitBreakerConfig,
    ) -> Self {
        info!(pool = ?pool.address(), "shared pool handle created");
        Self {
            inner: Arc::new(Mutex::new(PoolEnvironment {
                pool,
                ledger,
                oracle,
            })),
            breaker: Arc::new(CircuitBreaker::new(config)),
            pinned_time: Arc::new(RwLock::new(None)),
        }
    }

    /// Runs every following operation at `timestamp`.
    pub async fn pin_time(&self, timestamp: u64) {
        *self.pinned_time.write().await = Some(timestamp);
    }

    /// Returns to wall-clock time.
    pub async fn unpin_time(&self) {
        *self.pinned_time.write().await = None;
    }

    /// Pool clock in seconds.
    pub async fn now(&self) -> u64 {
        match *self.pinned_time.read().await {
            Some(timestamp) => timestamp,
            None => u64::try_from(Utc::now().timestamp()).unwrap_or_default(),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub async fn breaker_stats(&self) -> CircuitBreakerStats {
        self.breaker.stats().await
    }

    /// Runs a mutating operation under the lock. Refused with
    /// [`PoolError::PoolHalted`] while the breaker is open unless
    /// `allowed_when_halted`. The breaker and the clock are read once the
    /// lock is held, so a trip also stops operations already queued.
    async fn run<T>(
        &self,
        caller: H160,
        operation: &'static str,
        allowed_when_halted: bool,
        f: impl FnOnce(&mut StableSwapPool, &mut Context<'_>) -> PoolResult<T>,
    ) -> PoolResult<T> {
        let mut guard = self.inner.lock().await;
        if !allowed_when_halted && !self.breaker.is_allowed().await {
            debug!(operation, "refused while halted");
            return Err(PoolError::PoolHalted);
        }
        let timestamp = self.now().await;

        let result = {
            let env = &mut *guard;
            let mut ctx = Context::new(caller, timestamp, &mut env.ledger, &env.oracle);
            f(&mut env.pool, &mut ctx)
        };

        match &result {
            Ok(_) => self.breaker.record_success().await,
            Err(err) => {
                if self.breaker.record_failure(err).await {
                    info!(pool = ?guard.pool.address(), operation, "pool halted");
                }
            }
        }
        result
    }

    /// Runs a read-only closure against the current state.
    pub async fn view<T>(
        &self,
        f: impl FnOnce(&StableSwapPool, &ViewContext<'_>) -> PoolResult<T>,
    ) -> PoolResult<T> {
        let timestamp = self.now().await;
        let guard = self.inner.lock().await;
        let view = ViewContext::new(timestamp, &guard.ledger, &guard.oracle);
        f(&guard.pool, &view)
    }

    /// Runs any mutating pool operation, subject to the breaker.
    pub async fn execute<T>(
        &self,
        caller: H160,
        operation: &'static str,
        f: impl FnOnce(&mut StableSwapPool, &mut Context<'_>) -> PoolResult<T>,
    ) -> PoolResult<T> {
        self.run(caller, operation, false, f).await
    }

    pub async fn exchange(
        &self,
        caller: H160,
        i: usize,
        j: usize,
        dx: U256,
        min_dy: U256,
    ) -> PoolResult<U256> {
        self.run(caller, "exchange", false, |pool, ctx| {
            pool.exchange(ctx, i, j, dx, min_dy, None)
        })
        .await
    }

    pub async fn add_liquidity(
        &self,
        caller: H160,
        amounts: Vec<U256>,
        min_mint_amount: U256,
    ) -> PoolResult<U256> {
        self.run(caller, "add_liquidity", false, |pool, ctx| {
            pool.add_liquidity(ctx, &amounts, min_mint_amount, None)
        })
        .await
    }

    /// Balanced withdrawal. Served even while the pool is halted.
    pub async fn remove_liquidity(
        &self,
        caller: H160,
        burn_amount: U256,
        min_amounts: Vec<U256>,
    ) -> PoolResult<Vec<U256>> {
        self.run(caller, "remove_liquidity", true, |pool, ctx| {
            pool.remove_liquidity(ctx, burn_amount, &min_amounts, None)
        })
        .await
    }

    pub async fn remove_liquidity_one_coin(
        &self,
        caller: H160,
        burn_amount: U256,
        i: usize,
        min_received: U256,
    ) -> PoolResult<U256> {
        self.run(caller, "remove_liquidity_one_coin", false, |pool, ctx| {
            pool.remove_liquidity_one_coin(ctx, burn_amount, i, min_received, None)
        })
        .await
    }

    /// Clears a tripped breaker. Pool admin only.
    pub async fn reset_breaker(&self, caller: H160) -> PoolResult<()> {
        {
            let guard = self.inner.lock().await;
            if guard.pool.admin() != Some(caller) {
                return Err(PoolError::Unauthorized);
            }
        }
        self.breaker.reset().await;
        Ok(())
    }

    /// Mints `amount` of `token` to `to` directly on the ledger.
    pub async fn mint(&self, token: H160, to: H160, amount: U256) -> PoolResult<()> {
        self.inner.lock().await.ledger.mint(token, to, amount)
    }

    /// Lets `spender` pull up to `amount` of `owner`'s `token`.
    pub async fn approve(&self, token: H160, owner: H160, spender: H160, amount: U256) -> PoolResult<()> {
        self.inner.lock().await.ledger.approve(token, owner, spender, amount)
    }

    pub async fn balance_of(&self, token: H160, holder: H160) -> U256 {
        self.inner.lock().await.ledger.balance_of(token, holder)
    }

    pub async fn drain_events(&self) -> Vec<PoolEvent> {
        self.inner.lock().await.pool.drain_events()
    }

    /// Direct access to the guarded environment, e.g. to rebase a coin or
    /// move an oracle quote.
    pub async fn with_environment<T>(&self, f: impl FnOnce(&mut PoolEnvironment) -> T) -> T {
        let mut guard = self.inner.lock().await;
        f(&mut *guard)
    }
}
