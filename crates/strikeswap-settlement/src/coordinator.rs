//! Flash-accounted settlement.
//!
//! Deltas are computed and state is changed first. Only then is the caller
//! settled: everything owed to the caller is paid out, the engine's balances
//! of the owed-by-caller assets are snapshotted, the caller's callback runs
//! once, and the balances are checked again. If any balance grew by less
//! than what was owed, the whole operation is undone.
//!
//! A callback may settle nested operations of its own. Every committed
//! settlement records its flows (pay-ins claimed, payouts made) on the
//! enclosing frame, and an outer obligation discounts whatever nested
//! settlements already accounted for. One payment can therefore discharge
//! only one obligation.

use rust_decimal::Decimal;
use strikeswap_types::{AccountId, AssetDelta, NetDeltas, Result, StrikeswapError};
use tracing::{debug, warn};

use crate::assets::AssetTransferService;
use crate::engine::Engine;

/// Pays the engine what an operation requires.
///
/// Runs with the engine unlocked except for the pairs of the operation in
/// flight, so it may trade other pairs to source the funds.
pub trait SettlementCallback<S: AssetTransferService> {
    fn settle(&mut self, engine: &mut Engine<S>, deltas: &[AssetDelta], data: &[u8]) -> Result<()>;
}

impl<S, F> SettlementCallback<S> for F
where
    S: AssetTransferService,
    F: FnMut(&mut Engine<S>, &[AssetDelta], &[u8]) -> Result<()>,
{
    fn settle(&mut self, engine: &mut Engine<S>, deltas: &[AssetDelta], data: &[u8]) -> Result<()> {
        self(engine, deltas, data)
    }
}

/// Callback for operations that never require payment.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPayment;

impl<S: AssetTransferService> SettlementCallback<S> for NoPayment {
    fn settle(&mut self, _: &mut Engine<S>, _: &[AssetDelta], _: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Amounts the caller must pay in, with the engine's balance and the
/// already-accounted flows as they stood before the callback ran.
#[derive(Debug, Clone)]
pub struct Obligation {
    entries: Vec<Entry>,
}

#[derive(Debug, Clone)]
struct Entry {
    required: AssetDelta,
    balance: Decimal,
    settled: Decimal,
}

impl Obligation {
    /// Snapshot the engine's balance and the settled flow of every
    /// required asset.
    pub fn begin<S: AssetTransferService>(
        assets: &S,
        settled: &NetDeltas,
        required: Vec<AssetDelta>,
    ) -> Self {
        let entries = required
            .into_iter()
            .map(|required| Entry {
                balance: assets.balance(&required.asset),
                settled: settled.get(&required.asset),
                required,
            })
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Verify every required asset arrived and was not claimed by a nested
    /// settlement. Returns the claimed amounts.
    ///
    /// # Errors
    /// `InsufficientInput` naming the first asset that fell short.
    pub fn discharge<S: AssetTransferService>(
        self,
        assets: &S,
        settled: &NetDeltas,
    ) -> Result<Vec<AssetDelta>> {
        let mut claimed = Vec::with_capacity(self.entries.len());
        for entry in self.entries {
            let asset = &entry.required.asset;
            let nested = settled.get(asset) - entry.settled;
            let received = assets.balance(asset) - entry.balance - nested;
            if received < entry.required.amount {
                warn!(
                    asset = %asset,
                    required = %entry.required.amount,
                    received = %received,
                    nested = %nested,
                    "settlement short"
                );
                return Err(StrikeswapError::InsufficientInput {
                    asset: entry.required.asset,
                    required: entry.required.amount,
                    received,
                });
            }
            claimed.push(entry.required);
        }
        Ok(claimed)
    }
}

impl<S: AssetTransferService> Engine<S> {
    /// Settle net deltas with `recipient`.
    ///
    /// Must run inside a frame so that a failed check rolls the payouts
    /// back.
    pub(crate) fn settle<C: SettlementCallback<S>>(
        &mut self,
        recipient: &AccountId,
        net: &NetDeltas,
        data: &[u8],
        callback: &mut C,
    ) -> Result<()> {
        for payout in net.owed_to_caller() {
            self.assets_mut()
                .transfer(&payout.asset, recipient, payout.amount)?;
            self.account_settled(&payout.asset, -payout.amount)?;
            debug!(asset = %payout.asset, amount = %payout.amount, to = %recipient, "paid out");
        }

        let obligation =
            Obligation::begin(self.assets(), self.settled_flows()?, net.owed_by_caller());
        if obligation.is_empty() {
            return Ok(());
        }
        callback.settle(self, &net.to_vec(), data)?;
        for claimed in obligation.discharge(self.assets(), self.settled_flows()?)? {
            self.account_settled(&claimed.asset, claimed.amount)?;
        }
        Ok(())
    }
}
