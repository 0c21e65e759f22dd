//! Position ledger.
//!
//! Balances are keyed by `(owner, PositionKey)` where the key is the hash of
//! the position's logical identity, so the same descriptor always resolves
//! to the same record. Debt balances carry the borrow index they were last
//! rebased at; everything else keeps a growth snapshot of 1.
//!
//! The ledger keeps an undo log while a savepoint is open, which is what
//! lets the engine throw away a failed operation's position changes.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strikeswap_curve::math;
use strikeswap_types::{AccountId, PositionDescriptor, PositionKey, Result, StrikeswapError};

/// One owner's balance in one position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub descriptor: PositionDescriptor,
    pub balance: Decimal,
    /// Growth index the balance was last expressed at.
    pub growth: Decimal,
}

impl Position {
    #[must_use]
    pub fn new(descriptor: PositionDescriptor) -> Self {
        Self {
            descriptor,
            balance: Decimal::ZERO,
            growth: Decimal::ONE,
        }
    }
}

/// Read/write surface over positions.
///
/// Implementors only provide storage. The balance math lives in the
/// provided methods so every book applies it the same way.
pub trait PositionBook {
    fn position_of(&mut self, owner: &AccountId, key: &PositionKey) -> Option<Position>;

    fn put_position(&mut self, owner: &AccountId, position: Position);

    /// Current balance, zero if the position was never touched.
    fn balance(&mut self, owner: &AccountId, descriptor: &PositionDescriptor) -> Decimal {
        self.position_of(owner, &descriptor.key())
            .map_or(Decimal::ZERO, |p| p.balance)
    }

    /// Credit `amount`.
    ///
    /// # Errors
    /// `InvalidAmount` if `amount` is negative.
    fn mint(
        &mut self,
        owner: &AccountId,
        descriptor: &PositionDescriptor,
        amount: Decimal,
    ) -> Result<()> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(StrikeswapError::InvalidAmount {
                reason: format!("cannot mint a negative amount {amount}"),
            });
        }
        let mut position = self
            .position_of(owner, &descriptor.key())
            .unwrap_or_else(|| Position::new(descriptor.clone()));
        position.balance = math::add(position.balance, amount)?;
        self.put_position(owner, position);
        Ok(())
    }

    /// Debit `amount`.
    ///
    /// # Errors
    /// - `InvalidAmount` if `amount` is negative
    /// - `InsufficientBalance` if `amount` exceeds the balance
    fn burn(
        &mut self,
        owner: &AccountId,
        descriptor: &PositionDescriptor,
        amount: Decimal,
    ) -> Result<()> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(StrikeswapError::InvalidAmount {
                reason: format!("cannot burn a negative amount {amount}"),
            });
        }
        let mut position = self
            .position_of(owner, &descriptor.key())
            .unwrap_or_else(|| Position::new(descriptor.clone()));
        if amount > position.balance {
            return Err(StrikeswapError::InsufficientBalance {
                needed: amount,
                available: position.balance,
            });
        }
        position.balance = math::sub(position.balance, amount)?;
        self.put_position(owner, position);
        Ok(())
    }

    /// Re-express the balance at `growth`, creating the record if missing.
    /// Returns the rebased balance, rounded up.
    fn rebase(
        &mut self,
        owner: &AccountId,
        descriptor: &PositionDescriptor,
        growth: Decimal,
    ) -> Result<Decimal> {
        let mut position = self
            .position_of(owner, &descriptor.key())
            .unwrap_or_else(|| Position {
                growth,
                ..Position::new(descriptor.clone())
            });
        if position.growth != growth && !position.growth.is_zero() {
            let scaled = math::div(math::mul(position.balance, growth)?, position.growth)?;
            position.balance = math::round_up(scaled);
        }
        position.growth = growth;
        let balance = position.balance;
        self.put_position(owner, position);
        Ok(balance)
    }
}

type Slot = (AccountId, PositionKey);

/// Authoritative position store with savepoints.
#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
    positions: HashMap<Slot, Position>,
    /// Pre-images recorded while a savepoint is open.
    journal: Vec<(Slot, Option<Position>)>,
    /// Journal length at each open savepoint, innermost last.
    savepoints: Vec<usize>,
}

impl PositionLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn position(&self, owner: &AccountId, key: &PositionKey) -> Option<&Position> {
        self.positions.get(&(*owner, *key))
    }

    #[must_use]
    pub fn balance_of(&self, owner: &AccountId, key: &PositionKey) -> Decimal {
        self.position(owner, key).map_or(Decimal::ZERO, |p| p.balance)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AccountId, &Position)> {
        self.positions.iter().map(|((owner, _), p)| (owner, p))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn savepoint(&mut self) {
        self.savepoints.push(self.journal.len());
    }

    /// Keep everything written since the innermost savepoint.
    pub fn release_savepoint(&mut self) {
        self.savepoints.pop();
        if self.savepoints.is_empty() {
            self.journal.clear();
        }
    }

    /// Undo everything written since the innermost savepoint.
    pub fn rollback_to_savepoint(&mut self) {
        let Some(mark) = self.savepoints.pop() else {
            return;
        };
        while self.journal.len() > mark {
            let Some((slot, previous)) = self.journal.pop() else {
                break;
            };
            match previous {
                Some(position) => {
                    self.positions.insert(slot, position);
                }
                None => {
                    self.positions.remove(&slot);
                }
            }
        }
    }
}

impl PositionBook for PositionLedger {
    fn position_of(&mut self, owner: &AccountId, key: &PositionKey) -> Option<Position> {
        self.position(owner, key).cloned()
    }

    fn put_position(&mut self, owner: &AccountId, position: Position) {
        let slot = (*owner, position.descriptor.key());
        let previous = self.positions.insert(slot, position);
        if !self.savepoints.is_empty() {
            self.journal.push((slot, previous));
        }
    }
}

#[cfg(test)]
mod tests {
    use strikeswap_types::{PairKey, PositionKind};

    use super::*;

    fn liquidity_at(tick: i32) -> PositionDescriptor {
        PositionDescriptor::new(PairKey::dummy(), tick, 0, PositionKind::Liquidity)
    }

    #[test]
    fn mint_then_burn() {
        let mut ledger = PositionLedger::new();
        let alice = AccountId::new();
        let pos = liquidity_at(0);

        ledger.mint(&alice, &pos, Decimal::new(10, 0)).unwrap();
        ledger.burn(&alice, &pos, Decimal::new(4, 0)).unwrap();
        assert_eq!(ledger.balance_of(&alice, &pos.key()), Decimal::new(6, 0));
    }

    #[test]
    fn burn_beyond_balance_fails_without_change() {
        let mut ledger = PositionLedger::new();
        let alice = AccountId::new();
        let pos = liquidity_at(0);
        ledger.mint(&alice, &pos, Decimal::new(10, 0)).unwrap();

        let err = ledger.burn(&alice, &pos, Decimal::new(11, 0)).unwrap_err();
        assert!(matches!(err, StrikeswapError::InsufficientBalance { .. }));
        assert_eq!(ledger.balance_of(&alice, &pos.key()), Decimal::new(10, 0));
    }

    #[test]
    fn negative_mint_is_rejected() {
        let mut ledger = PositionLedger::new();
        let err = ledger
            .mint(&AccountId::new(), &liquidity_at(0), Decimal::NEGATIVE_ONE)
            .unwrap_err();
        assert!(matches!(err, StrikeswapError::InvalidAmount { .. }));
    }

    #[test]
    fn owners_and_descriptors_are_separate() {
        let mut ledger = PositionLedger::new();
        let (alice, bob) = (AccountId::new(), AccountId::new());
        ledger.mint(&alice, &liquidity_at(0), Decimal::ONE).unwrap();
        assert!(ledger.balance_of(&bob, &liquidity_at(0).key()).is_zero());
        assert!(ledger.balance_of(&alice, &liquidity_at(1).key()).is_zero());
    }

    #[test]
    fn rebase_scales_by_growth_ratio() {
        let mut ledger = PositionLedger::new();
        let alice = AccountId::new();
        let debt = PositionDescriptor::new(PairKey::dummy(), 0, 0, PositionKind::Debt);

        assert!(ledger.rebase(&alice, &debt, Decimal::ONE).unwrap().is_zero());
        ledger.mint(&alice, &debt, Decimal::new(100, 0)).unwrap();
        let grown = ledger.rebase(&alice, &debt, Decimal::new(11, 1)).unwrap();
        assert_eq!(grown, Decimal::new(110, 0));
        let grown = ledger.rebase(&alice, &debt, Decimal::new(121, 2)).unwrap();
        assert_eq!(grown, Decimal::new(121, 0));
        assert_eq!(
            ledger.position(&alice, &debt.key()).unwrap().growth,
            Decimal::new(121, 2)
        );
    }

    #[test]
    fn rollback_restores_savepoint() {
        let mut ledger = PositionLedger::new();
        let alice = AccountId::new();
        ledger.mint(&alice, &liquidity_at(0), Decimal::ONE).unwrap();

        ledger.savepoint();
        ledger.mint(&alice, &liquidity_at(0), Decimal::ONE).unwrap();
        ledger.mint(&alice, &liquidity_at(5), Decimal::ONE).unwrap();
        ledger.rollback_to_savepoint();

        assert_eq!(ledger.balance_of(&alice, &liquidity_at(0).key()), Decimal::ONE);
        assert!(ledger.position(&alice, &liquidity_at(5).key()).is_none());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn nested_savepoints_unwind_independently() {
        let mut ledger = PositionLedger::new();
        let alice = AccountId::new();

        ledger.savepoint();
        ledger.mint(&alice, &liquidity_at(0), Decimal::ONE).unwrap();
        ledger.savepoint();
        ledger.mint(&alice, &liquidity_at(1), Decimal::ONE).unwrap();
        ledger.rollback_to_savepoint();
        ledger.release_savepoint();

        assert_eq!(ledger.balance_of(&alice, &liquidity_at(0).key()), Decimal::ONE);
        assert!(ledger.position(&alice, &liquidity_at(1).key()).is_none());
    }

    #[test]
    fn released_inner_savepoint_still_rolls_back_with_outer() {
        let mut ledger = PositionLedger::new();
        let alice = AccountId::new();

        ledger.savepoint();
        ledger.savepoint();
        ledger.mint(&alice, &liquidity_at(0), Decimal::ONE).unwrap();
        ledger.release_savepoint();
        ledger.rollback_to_savepoint();

        assert!(ledger.is_empty());
    }
}
