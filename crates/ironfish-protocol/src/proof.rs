use crate::errors::ProofError;
use crate::transaction::{MintDescription, Output, Spend, Transaction};

// SPENDING KEY
// ================================================================================================

/// An opaque spend-authority key handed to the zero-knowledge layer.
///
/// The core never interprets key material; it only forwards it across the proof boundary.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SpendingKey(pub [u8; 32]);

impl core::fmt::Debug for SpendingKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // Key material stays out of logs.
        write!(f, "SpendingKey(..)")
    }
}

// PROOF VERIFIER
// ================================================================================================

/// The boundary to the zero-knowledge proving system.
///
/// The core treats proofs, ciphertexts and binding signatures as opaque bytes; an implementation
/// of this trait decides whether they verify. Implementations must call [`crate::crypto::initialize`]
/// before their first verification.
pub trait ProofVerifier: Send + Sync {
    /// Verifies a spend proof against its nullifier, commitment and claimed note-tree root.
    fn verify_spend(&self, spend: &Spend) -> Result<(), ProofError>;

    /// Verifies an output proof against its note commitment.
    fn verify_output(&self, output: &Output) -> Result<(), ProofError>;

    /// Verifies a mint proof against the mint's asset description.
    fn verify_mint(&self, mint: &MintDescription) -> Result<(), ProofError>;

    /// Verifies the transaction's binding signature, which commits to the per-asset value
    /// balance of all hidden spends and outputs.
    fn verify_binding(&self, transaction: &Transaction) -> Result<(), ProofError>;
}

// MINERS FEE FACTORY
// ================================================================================================

/// Constructs miner's fee transactions through the zero-knowledge layer.
pub trait MinersFeeFactory: Send + Sync {
    /// Creates the unique negative-fee transaction of a block at `sequence`, paying `fee` base
    /// units plus the block subsidy to the holder of `spending_key`.
    fn create_miners_fee(
        &self,
        fee: i64,
        sequence: u32,
        spending_key: &SpendingKey,
    ) -> Result<Transaction, ProofError>;
}
