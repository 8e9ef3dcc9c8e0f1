//! Per-call execution context.

use crate::ledger::Ledger;
use crate::rates::RateOracle;
use primitive_types::H160;

/// Everything a mutating pool operation needs from its environment: who is
/// calling, the pool clock, the token ledger and the rate oracle.
pub struct Context<'a> {
    pub caller: H160,
    pub timestamp: u64,
    pub ledger: &'a mut dyn Ledger,
    pub oracle: &'a dyn RateOracle,
}

impl<'a> Context<'a> {
    pub fn new(
        caller: H160,
        timestamp: u64,
        ledger: &'a mut dyn Ledger,
        oracle: &'a dyn RateOracle,
    ) -> Self {
        Self {
            caller,
            timestamp,
            ledger,
            oracle,
        }
    }

    /// Read-only view of this context.
    pub fn view(&self) -> ViewContext<'_> {
        ViewContext {
            timestamp: self.timestamp,
            ledger: &*self.ledger,
            oracle: self.oracle,
        }
    }

    /// Runs `f` with `caller` acting as the caller, then restores the
    /// original caller.
    pub fn as_caller<T>(&mut self, caller: H160, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = std::mem::replace(&mut self.caller, caller);
        let out = f(self);
        self.caller = previous;
        out
    }
}

/// Read-only context for quotes and views.
#[derive(Clone, Copy)]
pub struct ViewContext<'a> {
    pub timestamp: u64,
    pub ledger: &'a dyn Ledger,
    pub oracle: &'a dyn RateOracle,
}

impl<'a> ViewContext<'a> {
    pub fn new(timestamp: u64, ledger: &'a dyn Ledger, oracle: &'a dyn RateOracle) -> Self {
        Self {
            timestamp,
            ledger,
            oracle,
        }
    }
}
