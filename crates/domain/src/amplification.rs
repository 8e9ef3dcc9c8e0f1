use crate::error::{PoolError, PoolResult};
use crate::math::A_PRECISION;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Exclusive upper bound on A.
pub const MAX_A: u64 = 1_000_000;
/// A single ramp may move A by at most this factor in either direction.
pub const MAX_A_CHANGE: u64 = 10;
/// Minimum ramp duration, and minimum spacing between ramp starts, in seconds.
pub const MIN_RAMP_TIME: u64 = 86_400;

/// Amplification coefficient that moves linearly between two values over a
/// governance-chosen window.
///
/// Both endpoints are stored in precise units (`A * A_PRECISION`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmplificationRamp {
    initial_a: U256,
    future_a: U256,
    initial_time: u64,
    future_time: u64,
}

impl AmplificationRamp {
    /// A constant ramp at `a`.
    pub fn new(a: u64) -> PoolResult<Self> {
        if a == 0 || a >= MAX_A {
            return Err(PoolError::InvalidConfiguration(format!(
                "A must be in 1..{MAX_A}, got {a}"
            )));
        }
        let precise = U256::from(a) * U256::from(A_PRECISION);
        Ok(Self {
            initial_a: precise,
            future_a: precise,
            initial_time: 0,
            future_time: 0,
        })
    }

    /// A in precise units at `now`.
    pub fn a_precise(&self, now: u64) -> U256 {
        if now >= self.future_time {
            return self.future_a;
        }
        let duration = self.future_time.saturating_sub(self.initial_time);
        if duration == 0 {
            return self.future_a;
        }
        // A clock reading before the ramp start counts as no progress.
        let elapsed = U256::from(now.saturating_sub(self.initial_time));
        let duration = U256::from(duration);

        if self.future_a > self.initial_a {
            self.initial_a + (self.future_a - self.initial_a) * elapsed / duration
        } else {
            self.initial_a - (self.initial_a - self.future_a) * elapsed / duration
        }
    }

    /// A at `now`, rounded down to whole units.
    pub fn a(&self, now: u64) -> U256 {
        self.a_precise(now) / U256::from(A_PRECISION)
    }

    /// Starts a ramp from the current value toward `future_a`, reached at
    /// `future_time`.
    pub fn ramp(&mut self, future_a: u64, future_time: u64, now: u64) -> PoolResult<()> {
        if now < self.initial_time.saturating_add(MIN_RAMP_TIME) {
            return Err(PoolError::RampWindowTooShort);
        }
        if future_time < now.saturating_add(MIN_RAMP_TIME) {
            return Err(PoolError::RampWindowTooShort);
        }
        if future_a == 0 || future_a >= MAX_A {
            return Err(PoolError::RampBoundsExceeded);
        }

        let initial_a = self.a_precise(now);
        let future_a = U256::from(future_a) * U256::from(A_PRECISION);
        let max_change = U256::from(MAX_A_CHANGE);
        let within_bounds = if future_a < initial_a {
            future_a * max_change >= initial_a
        } else {
            future_a <= initial_a * max_change
        };
        if !within_bounds {
            return Err(PoolError::RampBoundsExceeded);
        }

        self.initial_a = initial_a;
        self.future_a = future_a;
        self.initial_time = now;
        self.future_time = future_time;
        Ok(())
    }

    /// Freezes A at its value at `now` and returns it.
    pub fn stop(&mut self, now: u64) -> U256 {
        let current = self.a_precise(now);
        self.initial_a = current;
        self.future_a = current;
        self.initial_time = now;
        self.future_time = now;
        current
    }

    pub fn initial_a_precise(&self) -> U256 {
        self.initial_a
    }

    pub fn future_a_precise(&self) -> U256 {
        self.future_a
    }

    pub fn initial_time(&self) -> u64 {
        self.initial_time
    }

    pub fn future_time(&self) -> u64 {
        self.future_time
    }

    pub fn is_ramping(&self, now: u64) -> bool {
        now < self.future_time && self.initial_a != self.future_a
    }
}
