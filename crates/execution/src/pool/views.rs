use super::StableSwapPool;
use crate::context::ViewContext;
use primitive_types::{H160, U256};
use stableswap_domain::math::{CheckedMath, PRECISION, get_d, get_p};
use stableswap_domain::{PoolError, PoolResult};

impl StableSwapPool {
    pub(crate) fn get_virtual_price_with(
        &self,
        view: &ViewContext<'_>,
        lp_rate: Option<U256>,
    ) -> PoolResult<U256> {
        let total_supply = self.state.total_supply;
        if total_supply.is_zero() {
            return Err(PoolError::ZeroTotalSupply);
        }
        let rates = self.rates_with(view, lp_rate)?;
        let xp = Self::xp_mem(&rates, &self.balances_mem(view)?)?;
        let d = get_d(&xp, self.amp(view.timestamp))?;
        d.mul_div(PRECISION, total_supply)
    }

    /// Value of one LP share in the pool's unit of account, scaled by 1e18.
    /// Never decreases through swaps or deposits.
    pub fn get_virtual_price(&self, view: &ViewContext<'_>) -> PoolResult<U256> {
        self.get_virtual_price_with(view, None)
    }

    pub(crate) fn get_p_with(
        &self,
        view: &ViewContext<'_>,
        lp_rate: Option<U256>,
        k: usize,
    ) -> PoolResult<U256> {
        if k + 1 >= self.n_coins() {
            return Err(PoolError::InvalidCoinIndex {
                index: k,
                n_coins: self.n_coins().saturating_sub(1),
            });
        }
        let rates = self.rates_with(view, lp_rate)?;
        let xp = Self::xp_mem(&rates, &self.balances_mem(view)?)?;
        let amp = self.amp(view.timestamp);
        let d = get_d(&xp, amp)?;
        Ok(get_p(&xp, amp, d)?[k])
    }

    /// Current spot price of coin `k + 1` in coin 0.
    pub fn get_p(&self, view: &ViewContext<'_>, k: usize) -> PoolResult<U256> {
        self.get_p_with(view, None, k)
    }

    /// Spot price recorded by the last oracle update.
    pub fn last_price(&self, k: usize) -> PoolResult<U256> {
        self.state.oracle.last_price(k)
    }

    pub fn ema_price(&self, k: usize) -> PoolResult<U256> {
        self.state.oracle.ema_price(k)
    }

    /// EMA price of coin `k + 1` in coin 0, projected to `now`.
    pub fn price_oracle(&self, k: usize, now: u64) -> PoolResult<U256> {
        self.state.oracle.price_oracle(k, now)
    }

    pub fn d_oracle(&self, now: u64) -> PoolResult<U256> {
        self.state.oracle.d_oracle(now)
    }

    pub fn a(&self, now: u64) -> U256 {
        self.state.ramp.a(now)
    }

    pub fn a_precise(&self, now: u64) -> U256 {
        self.amp(now)
    }

    pub fn initial_a(&self) -> U256 {
        self.state.ramp.initial_a_precise()
    }

    pub fn future_a(&self) -> U256 {
        self.state.ramp.future_a_precise()
    }

    pub fn initial_a_time(&self) -> u64 {
        self.state.ramp.initial_time()
    }

    pub fn future_a_time(&self) -> u64 {
        self.state.ramp.future_time()
    }

    /// LP-owned balance of coin `i`, admin fees excluded.
    pub fn balances(&self, view: &ViewContext<'_>, i: usize) -> PoolResult<U256> {
        self.check_index(i)?;
        Ok(self.balances_mem(view)?[i])
    }

    pub fn get_balances(&self, view: &ViewContext<'_>) -> PoolResult<Vec<U256>> {
        self.balances_mem(view)
    }

    /// Balances as last recorded by the pool, admin fees included.
    pub fn stored_balances(&self) -> &[U256] {
        &self.state.stored_balances
    }

    pub fn admin_balances(&self, i: usize) -> PoolResult<U256> {
        self.check_index(i)?;
        Ok(self.state.admin_balances[i])
    }

    pub fn stored_rates(&self, view: &ViewContext<'_>) -> PoolResult<Vec<U256>> {
        self.rates_with(view, None)
    }

    pub fn total_supply(&self) -> U256 {
        self.state.total_supply
    }

    pub fn lp_balance_of(&self, view: &ViewContext<'_>, holder: H160) -> U256 {
        view.ledger.balance_of(self.address, holder)
    }

    pub fn fee(&self) -> U256 {
        self.state.fees.fee
    }

    pub fn offpeg_fee_multiplier(&self) -> U256 {
        self.state.fees.offpeg_fee_multiplier
    }

    pub fn admin_fee(&self) -> U256 {
        self.state.fees.admin_fee
    }

    pub(crate) fn dynamic_fee_with(
        &self,
        view: &ViewContext<'_>,
        lp_rate: Option<U256>,
        i: usize,
        j: usize,
    ) -> PoolResult<U256> {
        self.check_pair(i, j)?;
        let rates = self.rates_with(view, lp_rate)?;
        let xp = Self::xp_mem(&rates, &self.balances_mem(view)?)?;
        self.state.fees.dynamic_fee(xp[i], xp[j])
    }

    /// Fee charged on a swap between coins `i` and `j` at current balances.
    pub fn dynamic_fee(&self, view: &ViewContext<'_>, i: usize, j: usize) -> PoolResult<U256> {
        self.dynamic_fee_with(view, None, i, j)
    }

    pub fn ma_exp_time(&self) -> u64 {
        self.state.oracle.ma_exp_time()
    }

    pub fn d_ma_time(&self) -> u64 {
        self.state.oracle.d_ma_time()
    }

    pub fn ma_last_time(&self) -> (u64, u64) {
        (self.state.oracle.price_time(), self.state.oracle.d_time())
    }

    pub fn admin(&self) -> Option<H160> {
        self.state.admin
    }

    pub fn future_admin(&self) -> Option<H160> {
        self.state.future_admin
    }
}
