use super::{Block, BlockHeader, CommitmentState, Graffiti};
use crate::consensus::ConsensusParameters;
use crate::constants::{ENCRYPTED_NOTE_LENGTH, ORE_PER_IRON, GENESIS_SEQUENCE, TREE_DEPTH};
use crate::errors::GenesisError;
use crate::hash::{BlockHash, MerkleRoot, NoteCommitment};
use crate::merkle::{NoteTreeHasher, NullifierTreeHasher, root_of_leaves, zero_ladder};
use crate::pow::PowHasher;
use crate::target::Target;
use crate::transaction::{NoteCiphertext, Output, Transaction, ZkProof};

/// Domain separation context for deterministic genesis data.
const GENESIS_CONTEXT: &str = "ironfish genesis";

/// Constructs the genesis block for the given consensus parameters.
///
/// Genesis is data, not a privileged code path: the returned block flows through the ordinary
/// ingest path, which recognizes it only by its sequence and all-zero parent hash. Construction
/// is fully deterministic so every node derives the identical block.
pub fn make_genesis_block(params: &ConsensusParameters) -> Result<Block, GenesisError> {
    let supply_ore = params
        .genesis_supply_in_iron
        .checked_mul(ORE_PER_IRON)
        .filter(|ore| *ore <= i64::MAX as u64)
        .ok_or(GenesisError::SupplyOutOfRange(params.genesis_supply_in_iron))?;

    // The entire initial supply is carried by a single miner's fee output.
    let commitment = NoteCommitment::new(genesis_bytes(params, b"note commitment"));
    let mut ciphertext = [0u8; ENCRYPTED_NOTE_LENGTH];
    let seed = genesis_bytes(params, b"note ciphertext");
    for (chunk, byte) in ciphertext.chunks_mut(32).zip(core::iter::repeat(seed)) {
        let len = chunk.len();
        chunk.copy_from_slice(&byte[..len]);
    }

    let miners_fee = Transaction::new(
        1,
        Vec::new(),
        vec![Output {
            merkle_hash: commitment,
            ciphertext: NoteCiphertext::new(ciphertext),
            proof: ZkProof::new([0u8; 192]),
        }],
        Vec::new(),
        Vec::new(),
        -(supply_ore as i64),
        0,
        genesis_bytes(params, b"public key randomness"),
        [0u8; 64],
    );

    let note_root = root_of_leaves(&NoteTreeHasher, &[commitment.into_bytes()]);
    let nullifier_root = zero_ladder(&NullifierTreeHasher)[TREE_DEPTH as usize];

    // Genesis goes through ordinary verification, so it must genuinely meet its target. The
    // scan over the nonce space is deterministic.
    let target = Target::from_difficulty(params.min_difficulty);
    let pow = PowHasher::for_sequence(params, GENESIS_SEQUENCE);
    let mut randomness = 0u64;
    let header = loop {
        let header = BlockHeader::new(
            GENESIS_SEQUENCE,
            BlockHash::ZERO,
            CommitmentState { root: MerkleRoot::new(note_root), size: 1 },
            CommitmentState { root: MerkleRoot::new(nullifier_root), size: 0 },
            target,
            randomness,
            params.genesis_timestamp_ms,
            Graffiti::from_str_lossy("genesis"),
            -(supply_ore as i64),
        );
        if target.meets(&header.pow_hash(pow)) {
            break header;
        }
        randomness += 1;
    };

    Ok(Block::new(header, vec![miners_fee]))
}

fn genesis_bytes(params: &ConsensusParameters, label: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(GENESIS_CONTEXT);
    hasher.update(label);
    hasher.update(&params.genesis_supply_in_iron.to_be_bytes());
    hasher.update(&params.genesis_timestamp_ms.to_be_bytes());
    *hasher.finalize().as_bytes()
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::make_genesis_block;
    use crate::consensus::ConsensusParameters;
    use crate::errors::GenesisError;

    #[test]
    fn genesis_is_deterministic() {
        let params = ConsensusParameters::default();
        let a = make_genesis_block(&params).unwrap();
        let b = make_genesis_block(&params).unwrap();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a, b);
    }

    #[test]
    fn genesis_has_the_genesis_shape() {
        let block = make_genesis_block(&ConsensusParameters::default()).unwrap();
        assert!(block.header().is_genesis());
        assert_eq!(block.transactions().len(), 1);
        assert!(block.transactions()[0].is_miners_fee());
        assert_eq!(block.header().miners_fee(), block.transactions()[0].fee());
        assert_eq!(block.header().note_commitment().size, 1);
        assert_eq!(block.header().nullifier_commitment().size, 0);
    }

    #[test]
    fn oversized_supply_is_rejected() {
        let params = ConsensusParameters {
            genesis_supply_in_iron: u64::MAX,
            ..ConsensusParameters::default()
        };
        assert_matches!(make_genesis_block(&params), Err(GenesisError::SupplyOutOfRange(_)));
    }

    #[test]
    fn genesis_varies_with_parameters() {
        let a = make_genesis_block(&ConsensusParameters::default()).unwrap();
        let params = ConsensusParameters {
            genesis_supply_in_iron: 1,
            ..ConsensusParameters::default()
        };
        let b = make_genesis_block(&params).unwrap();
        assert_ne!(a.hash(), b.hash());
    }
}
