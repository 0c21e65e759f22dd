//! Asset custody seam.
//!
//! The engine never holds balances itself; it asks an
//! [`AssetTransferService`] what it holds and to pay out. Pay-ins arrive
//! from the caller's settlement callback through whatever channel the
//! service exposes, and are observed as growth of the engine's balance.

use std::collections::HashMap;

use rust_decimal::Decimal;
use strikeswap_types::{AccountId, AssetId, Result, StrikeswapError};

/// External custody of the engine's assets.
pub trait AssetTransferService {
    /// Opaque snapshot used to undo transfers when an operation fails.
    type Checkpoint;

    /// What the engine currently holds of `asset`.
    fn balance(&self, asset: &AssetId) -> Decimal;

    /// Pay `amount` of `asset` out of the engine to `to`.
    fn transfer(&mut self, asset: &AssetId, to: &AccountId, amount: Decimal) -> Result<()>;

    fn checkpoint(&self) -> Self::Checkpoint;

    fn restore(&mut self, checkpoint: Self::Checkpoint);
}

/// A pre-authorized pull of funds from an account into the engine.
///
/// Verifying the authorization itself is the implementor's concern.
pub trait AuthorizedTransfer {
    fn pull(&mut self, from: &AccountId, asset: &AssetId, amount: Decimal) -> Result<()>;
}

/// In-memory custody: one balance per `(account, asset)`, with the engine
/// holding its own account.
#[derive(Debug, Clone)]
pub struct InMemoryAssets {
    engine: AccountId,
    accounts: HashMap<(AccountId, AssetId), Decimal>,
}

impl InMemoryAssets {
    #[must_use]
    pub fn new() -> Self {
        Self {
            engine: AccountId::new(),
            accounts: HashMap::new(),
        }
    }

    /// The account the engine's holdings live under.
    #[must_use]
    pub fn engine_account(&self) -> AccountId {
        self.engine
    }

    /// Credit `amount` out of thin air.
    pub fn mint(&mut self, account: AccountId, asset: &AssetId, amount: Decimal) {
        *self
            .accounts
            .entry((account, asset.clone()))
            .or_insert(Decimal::ZERO) += amount;
    }

    #[must_use]
    pub fn balance_of(&self, account: &AccountId, asset: &AssetId) -> Decimal {
        self.accounts
            .get(&(*account, asset.clone()))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Move funds from `from` into the engine.
    ///
    /// # Errors
    /// `TransferFailed` if `amount` is negative or `from` lacks the funds.
    pub fn pay_engine(&mut self, from: &AccountId, asset: &AssetId, amount: Decimal) -> Result<()> {
        let to = self.engine;
        self.move_funds(from, &to, asset, amount)
    }

    fn move_funds(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        asset: &AssetId,
        amount: Decimal,
    ) -> Result<()> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(StrikeswapError::TransferFailed {
                reason: format!("negative transfer of {amount} {asset}"),
            });
        }
        let available = self.balance_of(from, asset);
        if available < amount {
            return Err(StrikeswapError::TransferFailed {
                reason: format!("{from} holds {available} {asset}, needs {amount}"),
            });
        }
        self.accounts.insert((*from, asset.clone()), available - amount);
        self.mint(*to, asset, amount);
        Ok(())
    }
}

impl Default for InMemoryAssets {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetTransferService for InMemoryAssets {
    type Checkpoint = HashMap<(AccountId, AssetId), Decimal>;

    fn balance(&self, asset: &AssetId) -> Decimal {
        self.balance_of(&self.engine, asset)
    }

    fn transfer(&mut self, asset: &AssetId, to: &AccountId, amount: Decimal) -> Result<()> {
        let from = self.engine;
        self.move_funds(&from, to, asset, amount)
    }

    fn checkpoint(&self) -> Self::Checkpoint {
        self.accounts.clone()
    }

    fn restore(&mut self, checkpoint: Self::Checkpoint) {
        self.accounts = checkpoint;
    }
}

impl AuthorizedTransfer for InMemoryAssets {
    fn pull(&mut self, from: &AccountId, asset: &AssetId, amount: Decimal) -> Result<()> {
        self.pay_engine(from, asset, amount)
    }
}
