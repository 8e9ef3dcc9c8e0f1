use super::{Checkpoint, Ledger};
use primitive_types::{H160, U256};
use stableswap_domain::math::CheckedMath;
use stableswap_domain::{PoolError, PoolResult};
use std::collections::HashMap;
use tracing::trace;

#[derive(Debug, Clone)]
enum JournalEntry {
    Balance {
        token: H160,
        holder: H160,
        previous: U256,
    },
    Supply {
        token: H160,
        previous: U256,
    },
    Allowance {
        token: H160,
        owner: H160,
        spender: H160,
        previous: U256,
    },
}

/// Journaled in-memory ledger.
///
/// Writes are journaled only while a checkpoint is open, and the journal is
/// dropped once the outermost checkpoint commits.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    balances: HashMap<(H160, H160), U256>,
    supplies: HashMap<H160, U256>,
    allowances: HashMap<(H160, H160, H160), U256>,
    journal: Vec<JournalEntry>,
    depth: usize,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_balance(&mut self, token: H160, holder: H160, amount: U256) {
        let previous = self
            .balances
            .insert((token, holder), amount)
            .unwrap_or_default();
        if self.depth > 0 {
            self.journal.push(JournalEntry::Balance {
                token,
                holder,
                previous,
            });
        }
    }

    fn set_supply(&mut self, token: H160, amount: U256) {
        let previous = self.supplies.insert(token, amount).unwrap_or_default();
        if self.depth > 0 {
            self.journal.push(JournalEntry::Supply { token, previous });
        }
    }

    fn set_allowance(&mut self, token: H160, owner: H160, spender: H160, amount: U256) {
        let previous = self
            .allowances
            .insert((token, owner, spender), amount)
            .unwrap_or_default();
        if self.depth > 0 {
            self.journal.push(JournalEntry::Allowance {
                token,
                owner,
                spender,
                previous,
            });
        }
    }

    /// Scales every balance of `token` by `numerator / denominator`, the way
    /// a rebasing coin accrues yield without transfers.
    pub fn rebase(&mut self, token: H160, numerator: U256, denominator: U256) -> PoolResult<()> {
        let holders: Vec<(H160, U256)> = self
            .balances
            .iter()
            .filter(|((t, _), _)| *t == token)
            .map(|((_, holder), amount)| (*holder, *amount))
            .collect();

        let mut supply = U256::zero();
        for (holder, amount) in holders {
            let scaled = amount.mul_div(numerator, denominator)?;
            supply = supply.safe_add(scaled)?;
            self.set_balance(token, holder, scaled);
        }
        self.set_supply(token, supply);
        trace!(token = ?token, supply = %supply, "rebased");
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Ledger for InMemoryLedger {
    fn balance_of(&self, token: H160, holder: H160) -> U256 {
        self.balances
            .get(&(token, holder))
            .copied()
            .unwrap_or_default()
    }

    fn total_supply(&self, token: H160) -> U256 {
        self.supplies.get(&token).copied().unwrap_or_default()
    }

    fn transfer(&mut self, token: H160, from: H160, to: H160, amount: U256) -> PoolResult<()> {
        let available = self.balance_of(token, from);
        if available < amount {
            return Err(PoolError::InsufficientBalance {
                coin: token,
                holder: from,
                needed: amount,
                available,
            });
        }
        if from == to {
            return Ok(());
        }
        self.set_balance(token, from, available - amount);
        let credited = self.balance_of(token, to).safe_add(amount)?;
        self.set_balance(token, to, credited);
        Ok(())
    }

    fn mint(&mut self, token: H160, to: H160, amount: U256) -> PoolResult<()> {
        let supply = self.total_supply(token).safe_add(amount)?;
        let balance = self.balance_of(token, to).safe_add(amount)?;
        self.set_supply(token, supply);
        self.set_balance(token, to, balance);
        Ok(())
    }

    fn burn(&mut self, token: H160, from: H160, amount: U256) -> PoolResult<()> {
        let available = self.balance_of(token, from);
        if available < amount {
            return Err(PoolError::InsufficientBalance {
                coin: token,
                holder: from,
                needed: amount,
                available,
            });
        }
        let supply = self.total_supply(token).safe_sub(amount)?;
        self.set_supply(token, supply);
        self.set_balance(token, from, available - amount);
        Ok(())
    }

    fn allowance(&self, token: H160, owner: H160, spender: H160) -> U256 {
        self.allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default()
    }

    fn approve(&mut self, token: H160, owner: H160, spender: H160, amount: U256) -> PoolResult<()> {
        self.set_allowance(token, owner, spender, amount);
        trace!(token = ?token, owner = ?owner, spender = ?spender, amount = %amount, "approved");
        Ok(())
    }

    fn transfer_from(
        &mut self,
        token: H160,
        spender: H160,
        from: H160,
        to: H160,
        amount: U256,
    ) -> PoolResult<()> {
        let allowed = self.allowance(token, from, spender);
        if allowed < amount {
            return Err(PoolError::InsufficientBalance {
                coin: token,
                holder: from,
                needed: amount,
                available: allowed,
            });
        }
        self.transfer(token, from, to, amount)?;
        if allowed != U256::MAX {
            self.set_allowance(token, from, spender, allowed - amount);
        }
        Ok(())
    }

    fn checkpoint(&mut self) -> Checkpoint {
        self.depth += 1;
        Checkpoint(self.journal.len())
    }

    fn revert(&mut self, checkpoint: Checkpoint) {
        while self.journal.len() > checkpoint.0 {
            match self.journal.pop() {
                Some(JournalEntry::Balance {
                    token,
                    holder,
                    previous,
                }) => {
                    self.balances.insert((token, holder), previous);
                }
                Some(JournalEntry::Supply { token, previous }) => {
                    self.supplies.insert(token, previous);
                }
                Some(JournalEntry::Allowance {
                    token,
                    owner,
                    spender,
                    previous,
                }) => {
                    self.allowances.insert((token, owner, spender), previous);
                }
                None => break,
            }
        }
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.journal.clear();
        }
    }

    fn commit(&mut self, _checkpoint: Checkpoint) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.journal.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(v: u64) -> H160 {
        H160::from_low_u64_be(v)
    }

    #[test]
    fn test_mint_transfer_burn() {
        let mut ledger = InMemoryLedger::new();
        let token = addr(1);
        ledger.mint(token, addr(10), U256::from(100u64)).unwrap();
        ledger
            .transfer(token, addr(10), addr(11), U256::from(40u64))
            .unwrap();
        ledger.burn(token, addr(11), U256::from(15u64)).unwrap();

        assert_eq!(ledger.balance_of(token, addr(10)), U256::from(60u64));
        assert_eq!(ledger.balance_of(token, addr(11)), U256::from(25u64));
        assert_eq!(ledger.total_supply(token), U256::from(85u64));
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let mut ledger = InMemoryLedger::new();
        let token = addr(1);
        ledger.mint(token, addr(10), U256::from(5u64)).unwrap();
        let err = ledger
            .transfer(token, addr(10), addr(11), U256::from(6u64))
            .unwrap_err();
        assert_eq!(
            err,
            PoolError::InsufficientBalance {
                coin: token,
                holder: addr(10),
                needed: U256::from(6u64),
                available: U256::from(5u64),
            }
        );
    }

    #[test]
    fn test_nested_checkpoints() {
        let mut ledger = InMemoryLedger::new();
        let token = addr(1);
        ledger.mint(token, addr(10), U256::from(100u64)).unwrap();

        let outer = ledger.checkpoint();
        ledger
            .transfer(token, addr(10), addr(11), U256::from(30u64))
            .unwrap();

        let inner = ledger.checkpoint();
        ledger.mint(token, addr(12), U256::from(7u64)).unwrap();
        ledger.revert(inner);
        assert_eq!(ledger.balance_of(token, addr(12)), U256::zero());
        assert_eq!(ledger.balance_of(token, addr(11)), U256::from(30u64));

        ledger.revert(outer);
        assert_eq!(ledger.balance_of(token, addr(10)), U256::from(100u64));
        assert_eq!(ledger.balance_of(token, addr(11)), U256::zero());
        assert_eq!(ledger.depth(), 0);
    }

    #[test]
    fn test_commit_keeps_changes() {
        let mut ledger = InMemoryLedger::new();
        let token = addr(1);
        let cp = ledger.checkpoint();
        ledger.mint(token, addr(10), U256::from(9u64)).unwrap();
        ledger.commit(cp);
        assert_eq!(ledger.balance_of(token, addr(10)), U256::from(9u64));
        assert_eq!(ledger.depth(), 0);
    }

    #[test]
    fn test_transfer_from_spends_allowance() {
        let mut ledger = InMemoryLedger::new();
        let token = addr(1);
        ledger.mint(token, addr(10), U256::from(100u64)).unwrap();

        let err = ledger
            .transfer_from(token, addr(20), addr(10), addr(11), U256::from(1u64))
            .unwrap_err();
        assert_eq!(
            err,
            PoolError::InsufficientBalance {
                coin: token,
                holder: addr(10),
                needed: U256::from(1u64),
                available: U256::zero(),
            }
        );

        ledger
            .approve(token, addr(10), addr(20), U256::from(50u64))
            .unwrap();
        ledger
            .transfer_from(token, addr(20), addr(10), addr(11), U256::from(30u64))
            .unwrap();
        assert_eq!(ledger.allowance(token, addr(10), addr(20)), U256::from(20u64));
        assert_eq!(ledger.balance_of(token, addr(11)), U256::from(30u64));
        assert!(ledger
            .transfer_from(token, addr(20), addr(10), addr(11), U256::from(21u64))
            .is_err());
    }

    #[test]
    fn test_unlimited_allowance_is_not_spent() {
        let mut ledger = InMemoryLedger::new();
        let token = addr(1);
        ledger.mint(token, addr(10), U256::from(100u64)).unwrap();
        ledger.approve(token, addr(10), addr(20), U256::MAX).unwrap();
        ledger
            .transfer_from(token, addr(20), addr(10), addr(11), U256::from(60u64))
            .unwrap();
        assert_eq!(ledger.allowance(token, addr(10), addr(20)), U256::MAX);

        // allowance covers it, balance does not
        let err = ledger
            .transfer_from(token, addr(20), addr(10), addr(11), U256::from(41u64))
            .unwrap_err();
        assert!(matches!(
            err,
            PoolError::InsufficientBalance { available, .. } if available == U256::from(40u64)
        ));
    }

    #[test]
    fn test_revert_restores_allowance() {
        let mut ledger = InMemoryLedger::new();
        let token = addr(1);
        ledger.mint(token, addr(10), U256::from(100u64)).unwrap();
        ledger
            .approve(token, addr(10), addr(20), U256::from(50u64))
            .unwrap();

        let cp = ledger.checkpoint();
        ledger
            .transfer_from(token, addr(20), addr(10), addr(11), U256::from(50u64))
            .unwrap();
        ledger.approve(token, addr(10), addr(21), U256::from(9u64)).unwrap();
        ledger.revert(cp);

        assert_eq!(ledger.allowance(token, addr(10), addr(20)), U256::from(50u64));
        assert_eq!(ledger.allowance(token, addr(10), addr(21)), U256::zero());
        assert_eq!(ledger.balance_of(token, addr(10)), U256::from(100u64));
    }

    #[test]
    fn test_rebase_scales_all_holders() {
        let mut ledger = InMemoryLedger::new();
        let token = addr(1);
        ledger.mint(token, addr(10), U256::from(100u64)).unwrap();
        ledger.mint(token, addr(11), U256::from(300u64)).unwrap();
        ledger
            .rebase(token, U256::from(11u64), U256::from(10u64))
            .unwrap();
        assert_eq!(ledger.balance_of(token, addr(10)), U256::from(110u64));
        assert_eq!(ledger.balance_of(token, addr(11)), U256::from(330u64));
        assert_eq!(ledger.total_supply(token), U256::from(440u64));
    }
}
