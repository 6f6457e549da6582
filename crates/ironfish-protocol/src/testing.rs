//! Deterministic builders and mock boundary implementations for tests.

use crate::block::{BlockHeader, CommitmentState, Graffiti};
use crate::constants::{ENCRYPTED_NOTE_LENGTH, PROOF_LENGTH};
use crate::crypto;
use crate::errors::ProofError;
use crate::hash::{BlockHash, MerkleRoot, NoteCommitment, Nullifier};
use crate::proof::{MinersFeeFactory, ProofVerifier, SpendingKey};
use crate::target::Target;
use crate::transaction::{
    MintDescription,
    NoteCiphertext,
    Output,
    Spend,
    Transaction,
    ZkProof,
};

fn seeded(label: &[u8], seed: u64) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key("ironfish test data");
    hasher.update(label);
    hasher.update(&seed.to_be_bytes());
    *hasher.finalize().as_bytes()
}

/// Returns a deterministic output whose commitment is derived from `seed`.
pub fn output_with_seed(seed: u64) -> Output {
    let mut ciphertext = [0u8; ENCRYPTED_NOTE_LENGTH];
    let fill = seeded(b"ciphertext", seed);
    for (i, byte) in ciphertext.iter_mut().enumerate() {
        *byte = fill[i % 32];
    }
    Output {
        merkle_hash: NoteCommitment::new(seeded(b"commitment", seed)),
        ciphertext: NoteCiphertext::new(ciphertext),
        proof: ZkProof::new([0u8; PROOF_LENGTH]),
    }
}

/// Returns a deterministic spend of the note tagged by `nullifier`.
pub fn spend_with_nullifier(nullifier: Nullifier, root: MerkleRoot, tree_size: u32) -> Spend {
    Spend {
        nullifier,
        root_hash: root,
        tree_size,
        proof: ZkProof::new([0u8; PROOF_LENGTH]),
        commitment: NoteCommitment::new(seeded(b"spend commitment", tree_size as u64)),
    }
}

/// Returns a transaction with one spend and one output, deterministic in its arguments.
pub fn transaction_with_fee(fee: i64, expiration_sequence: u32) -> Transaction {
    let nullifier =
        Nullifier::new(seeded(b"nullifier", (fee as u64) ^ ((expiration_sequence as u64) << 32)));
    transaction_with_spend(nullifier, MerkleRoot::ZERO, 0, fee, expiration_sequence)
}

/// Returns a transaction spending the note tagged by `nullifier` against the given root.
pub fn transaction_with_spend(
    nullifier: Nullifier,
    root: MerkleRoot,
    tree_size: u32,
    fee: i64,
    expiration_sequence: u32,
) -> Transaction {
    Transaction::new(
        1,
        vec![spend_with_nullifier(nullifier, root, tree_size)],
        vec![output_with_seed(fee as u64)],
        Vec::new(),
        Vec::new(),
        fee,
        expiration_sequence,
        seeded(b"randomness", fee as u64),
        [0u8; 64],
    )
}

/// Returns a transaction with one output and no spends, deterministic in `seed`.
pub fn transaction_paying(fee: i64, expiration_sequence: u32, seed: u64) -> Transaction {
    Transaction::new(
        1,
        Vec::new(),
        vec![output_with_seed(seed)],
        Vec::new(),
        Vec::new(),
        fee,
        expiration_sequence,
        seeded(b"paying randomness", seed),
        [0u8; 64],
    )
}

/// Returns a miner's fee transaction for a block at `sequence`.
pub fn miners_fee_transaction(fee: i64, sequence: u32) -> Transaction {
    assert!(fee < 0, "a miner's fee must be negative");
    Transaction::new(
        1,
        Vec::new(),
        vec![output_with_seed(((sequence as u64) << 32) | 0xfee)],
        Vec::new(),
        Vec::new(),
        fee,
        0,
        seeded(b"miner randomness", sequence as u64),
        [0u8; 64],
    )
}

/// Returns a transaction carrying only the provided mint descriptions.
pub fn transaction_with_mints(mints: Vec<MintDescription>, fee: i64) -> Transaction {
    Transaction::new(
        1,
        Vec::new(),
        vec![output_with_seed(fee as u64)],
        mints,
        Vec::new(),
        fee,
        0,
        seeded(b"mint randomness", fee as u64),
        [0u8; 64],
    )
}

/// Returns a header with plausible fields, deterministic in `sequence`.
pub fn header_with_sequence(sequence: u32) -> BlockHeader {
    BlockHeader::new(
        sequence,
        BlockHash::new(seeded(b"parent", sequence as u64)),
        CommitmentState {
            root: MerkleRoot::new(seeded(b"note root", sequence as u64)),
            size: sequence,
        },
        CommitmentState {
            root: MerkleRoot::new(seeded(b"nullifier root", sequence as u64)),
            size: sequence / 2,
        },
        Target::MAX,
        42,
        1_700_000_000_000 + sequence as u64 * 60_000,
        Graffiti::from_str_lossy("test"),
        -20,
    )
}

// MOCK PROOF VERIFIER
// ================================================================================================

/// A [`ProofVerifier`] that accepts or rejects everything, for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockProofVerifier {
    /// When true, every verification fails.
    pub reject: bool,
}

impl MockProofVerifier {
    fn check(&self, error: ProofError) -> Result<(), ProofError> {
        assert!(crypto::is_initialized(), "crypto must be initialized before proof verification");
        if self.reject { Err(error) } else { Ok(()) }
    }
}

impl ProofVerifier for MockProofVerifier {
    fn verify_spend(&self, _spend: &Spend) -> Result<(), ProofError> {
        self.check(ProofError::InvalidSpendProof)
    }

    fn verify_output(&self, _output: &Output) -> Result<(), ProofError> {
        self.check(ProofError::InvalidOutputProof)
    }

    fn verify_mint(&self, _mint: &MintDescription) -> Result<(), ProofError> {
        self.check(ProofError::InvalidMintProof)
    }

    fn verify_binding(&self, _transaction: &Transaction) -> Result<(), ProofError> {
        self.check(ProofError::InvalidBindingSignature)
    }
}

// MOCK MINERS FEE FACTORY
// ================================================================================================

/// A [`MinersFeeFactory`] producing deterministic miner's fee transactions, for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockMinersFeeFactory;

impl MinersFeeFactory for MockMinersFeeFactory {
    fn create_miners_fee(
        &self,
        fee: i64,
        sequence: u32,
        _spending_key: &SpendingKey,
    ) -> Result<Transaction, ProofError> {
        if fee >= 0 {
            return Err(ProofError::MinersFeeFailed(format!("fee {fee} is not negative")));
        }
        Ok(miners_fee_transaction(fee, sequence))
    }
}
