//! Two-pass batch routing.
//!
//! Pass one simulates the batch against a read-only engine to resolve
//! symbolic amounts and learn the per-asset net. Pass two encodes the
//! resolved batch with an authorization for exactly what the caller will
//! owe. Submission re-checks the envelope and then lets the engine execute
//! the batch against live state, pulling funds only up to the authorized
//! amounts.

use rust_decimal::Decimal;
use strikeswap_settlement::{
    AssetTransferService, AuthorizedTransfer, BatchReceipt, Engine, SettlementCallback,
};
use strikeswap_types::{AccountId, AssetDelta, Command, EngineConfig, Result, StrikeswapError};
use tracing::{debug, info, warn};

use crate::batch::{self, EncodedBatch};
use crate::nonce::NonceGuard;
use crate::simulator::{Simulation, Simulator};

/// A simulated batch and its encoding.
#[derive(Debug, Clone)]
pub struct Plan {
    pub simulation: Simulation,
    pub batch: EncodedBatch,
}

/// Plans and submits batches, rejecting replays.
#[derive(Debug, Clone)]
pub struct Router {
    nonces: NonceGuard,
}

impl Router {
    /// # Errors
    /// `Configuration` if the nonce cache size is zero.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            nonces: NonceGuard::new(config.nonce_cache_size)?,
        })
    }

    /// Simulate `commands` at the engine's current time and encode the
    /// result.
    ///
    /// # Errors
    /// - `NonceReused` if `nonce` was already consumed
    /// - anything the simulation reports
    pub fn plan<S: AssetTransferService>(
        &self,
        engine: &Engine<S>,
        owner: &AccountId,
        commands: &[Command],
        deadline: u64,
        nonce: u64,
    ) -> Result<Plan> {
        self.nonces.check(nonce)?;
        let simulation = Simulator::new(engine, engine.now()).simulate(owner, commands)?;
        let batch = batch::encode(&simulation, owner, deadline, nonce)?;
        debug!(
            owner = %owner,
            nonce,
            digest = %batch.digest_hex(),
            transfers = batch.transfers.len(),
            "batch planned"
        );
        Ok(Plan { simulation, batch })
    }

    /// Execute an encoded batch.
    ///
    /// # Errors
    /// - `BatchExpired` if the engine's clock is past the deadline
    /// - `NonceReused` if the nonce was already consumed
    /// - `NonceCacheFull` if every remembered batch is still unexpired
    /// - `DigestMismatch` if any covered field was altered
    /// - anything execution or settlement reports, including
    ///   `InsufficientInput` if live state needs more than was authorized
    pub fn submit<S>(&mut self, engine: &mut Engine<S>, batch: &EncodedBatch) -> Result<BatchReceipt>
    where
        S: AssetTransferService + AuthorizedTransfer,
    {
        let now = engine.now();
        if now > batch.deadline {
            return Err(StrikeswapError::BatchExpired {
                deadline: batch.deadline,
                now,
            });
        }
        self.nonces.admit(batch.nonce, now)?;
        if !batch.verify_digest() {
            warn!(owner = %batch.owner, nonce = batch.nonce, "batch digest mismatch");
            return Err(StrikeswapError::DigestMismatch);
        }

        let commands = batch.commands()?;
        let mut permit = PermitCallback::new(batch.owner, &batch.transfers);
        let receipt = engine.execute_batch(&batch.owner, &commands, &[], &mut permit)?;
        self.nonces.mark_used(batch.nonce, batch.deadline, now)?;

        info!(
            owner = %batch.owner,
            nonce = batch.nonce,
            commands = commands.len(),
            "batch submitted"
        );
        Ok(receipt)
    }

    /// Whether `nonce` has been consumed by a successful submission.
    #[must_use]
    pub fn is_used(&self, nonce: u64) -> bool {
        self.nonces.is_used(nonce)
    }
}

/// Pays a batch's settlement from the owner's authorization.
struct PermitCallback {
    owner: AccountId,
    /// Authorization left per asset.
    remaining: Vec<AssetDelta>,
}

impl PermitCallback {
    fn new(owner: AccountId, transfers: &[AssetDelta]) -> Self {
        Self {
            owner,
            remaining: transfers.to_vec(),
        }
    }
}

impl<S> SettlementCallback<S> for PermitCallback
where
    S: AssetTransferService + AuthorizedTransfer,
{
    fn settle(&mut self, engine: &mut Engine<S>, deltas: &[AssetDelta], _: &[u8]) -> Result<()> {
        for required in deltas.iter().filter(|d| d.amount > Decimal::ZERO) {
            let Some(permit) = self.remaining.iter_mut().find(|p| p.asset == required.asset) else {
                continue;
            };
            let amount = required.amount.min(permit.amount);
            if amount <= Decimal::ZERO {
                continue;
            }
            engine.assets_mut().pull(&self.owner, &required.asset, amount)?;
            permit.amount -= amount;
        }
        Ok(())
    }
}
