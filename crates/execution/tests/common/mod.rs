#![allow(dead_code)]

use stableswap_execution::prelude::*;

pub const E18: u64 = 1_000_000_000_000_000_000;
pub const T0: u64 = 1_700_000_000;
pub const DAY: u64 = 86_400;

pub const ADMIN: u64 = 100;
pub const FEE_RECEIVER: u64 = 101;
pub const ALICE: u64 = 7;
pub const BOB: u64 = 8;
pub const POOL: u64 = 1_000;

/// Routes `tracing` output through the test harness's captured stdout.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn addr(v: u64) -> Address {
    Address::from_low_u64_be(v)
}

/// Coin address for coin `k` of a test pool.
pub fn coin(k: u64) -> Address {
    addr(10 + k)
}

/// `n` whole units of an 18-decimal coin.
pub fn units(n: u64) -> U256 {
    U256::from(n) * U256::from(E18)
}

/// `n` whole units of a coin with `decimals` decimals.
pub fn units_of(n: u64, decimals: u8) -> U256 {
    U256::from(n) * U256::exp10(decimals as usize)
}

/// A pool with its ledger and rate oracle.
pub struct Harness {
    pub pool: StableSwapPool,
    pub ledger: InMemoryLedger,
    pub oracle: StaticRateOracle,
    pub now: u64,
}

impl Harness {
    pub fn new(config: PoolConfig) -> Self {
        init_tracing();
        Self {
            pool: StableSwapPool::new(addr(POOL), config, T0).unwrap(),
            ledger: InMemoryLedger::new(),
            oracle: StaticRateOracle::new(),
            now: T0,
        }
    }

    /// Plain pool of standard coins.
    pub fn plain(decimals: &[u8], a: u64, fee: u64) -> Self {
        Self::new(plain_config(decimals, a, fee))
    }

    /// Runs `f` as `caller` at the harness clock.
    pub fn call<T>(
        &mut self,
        caller: u64,
        f: impl FnOnce(&mut StableSwapPool, &mut Context<'_>) -> T,
    ) -> T {
        let mut ctx = Context::new(addr(caller), self.now, &mut self.ledger, &self.oracle);
        f(&mut self.pool, &mut ctx)
    }

    pub fn view<T>(&self, f: impl FnOnce(&StableSwapPool, &ViewContext<'_>) -> T) -> T {
        let view = ViewContext::new(self.now, &self.ledger, &self.oracle);
        f(&self.pool, &view)
    }

    /// Mints `amounts` to `holder` and approves the pool to pull them.
    pub fn fund(&mut self, holder: u64, amounts: &[U256]) {
        let coins: Vec<Address> = self.pool.coins().iter().map(|c| c.address).collect();
        for (token, amount) in coins.into_iter().zip(amounts) {
            self.ledger.mint(token, addr(holder), *amount).unwrap();
            self.ledger
                .approve(token, addr(holder), addr(POOL), U256::MAX)
                .unwrap();
        }
    }

    /// Funds `holder` and deposits `amounts`, returning the LP minted.
    pub fn seed(&mut self, holder: u64, amounts: &[U256]) -> U256 {
        self.fund(holder, amounts);
        self.call(holder, |pool, ctx| {
            pool.add_liquidity(ctx, amounts, U256::zero(), None)
        })
        .unwrap()
    }

    pub fn balance(&self, token: Address, holder: u64) -> U256 {
        self.ledger.balance_of(token, addr(holder))
    }

    pub fn lp_balance(&self, holder: u64) -> U256 {
        self.ledger.balance_of(addr(POOL), addr(holder))
    }

    pub fn virtual_price(&self) -> U256 {
        self.view(|pool, view| pool.get_virtual_price(view)).unwrap()
    }

    pub fn balances(&self) -> Vec<U256> {
        self.view(|pool, view| pool.get_balances(view)).unwrap()
    }
}

pub fn plain_config(decimals: &[u8], a: u64, fee: u64) -> PoolConfig {
    let coins = decimals
        .iter()
        .enumerate()
        .map(|(k, d)| CoinSpec::standard(coin(k as u64), *d))
        .collect();
    PoolConfig::new("Test Pool", "TST", coins, a, addr(ADMIN))
        .with_fee(U256::from(fee))
        .with_fee_receiver(addr(FEE_RECEIVER))
}

/// Absolute difference.
pub fn diff(a: U256, b: U256) -> U256 {
    if a > b { a - b } else { b - a }
}
