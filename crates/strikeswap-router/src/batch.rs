//! Encoded batches: the resolved command list in wire form, the transfer
//! authorization the engine may draw on, and a SHA-256 digest binding the
//! two to an owner, deadline and nonce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strikeswap_types::{AccountId, AssetDelta, Command, Result, decode_batch, encode_batch};

use crate::simulator::Simulation;

/// A batch ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedBatch {
    pub owner: AccountId,
    /// JSON command list with every amount literal.
    pub payload: Vec<u8>,
    /// Maximum the engine may pull per asset (the positive nets).
    pub transfers: Vec<AssetDelta>,
    /// Last ledger time at which the batch may execute.
    pub deadline: u64,
    pub nonce: u64,
    pub digest: [u8; 32],
    /// Wall-clock time of encoding. Not covered by the digest.
    pub encoded_at: DateTime<Utc>,
}

impl EncodedBatch {
    /// Parse the command list back out of the payload.
    pub fn commands(&self) -> Result<Vec<Command>> {
        decode_batch(&self.payload)
    }

    /// Recompute the digest and compare.
    #[must_use]
    pub fn verify_digest(&self) -> bool {
        compute_digest(
            &self.owner,
            &self.payload,
            &self.transfers,
            self.deadline,
            self.nonce,
        ) == self.digest
    }

    #[must_use]
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

/// Encode a simulated batch for submission.
///
/// # Errors
/// `Serialization` if the commands cannot be encoded.
pub fn encode(
    simulation: &Simulation,
    owner: &AccountId,
    deadline: u64,
    nonce: u64,
) -> Result<EncodedBatch> {
    let payload = encode_batch(&simulation.commands)?;
    let transfers = simulation.net.owed_by_caller();
    let digest = compute_digest(owner, &payload, &transfers, deadline, nonce);
    Ok(EncodedBatch {
        owner: *owner,
        payload,
        transfers,
        deadline,
        nonce,
        digest,
        encoded_at: Utc::now(),
    })
}

/// SHA-256 over everything that determines what a batch may do.
fn compute_digest(
    owner: &AccountId,
    payload: &[u8],
    transfers: &[AssetDelta],
    deadline: u64,
    nonce: u64,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"strikeswap:batch:v1:");
    hasher.update(owner.0.as_bytes());
    hasher.update(deadline.to_le_bytes());
    hasher.update(nonce.to_le_bytes());
    hasher.update((payload.len() as u64).to_le_bytes());
    hasher.update(payload);
    hasher.update((transfers.len() as u64).to_le_bytes());
    for transfer in transfers {
        let symbol = transfer.asset.as_str().as_bytes();
        hasher.update((symbol.len() as u64).to_le_bytes());
        hasher.update(symbol);
        hasher.update(transfer.amount.to_string().as_bytes());
        hasher.update([0u8]);
    }

    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}
