use crate::consensus::ConsensusParameters;

/// Domain separation context for the upgraded proof-of-work function.
const FISH_HASH_CONTEXT: &str = "ironfish pow upgrade 2023";

// POW HASHER
// ================================================================================================

/// The proof-of-work hash function applied to a serialized block header.
///
/// The network upgraded its PoW function post-genesis; the function for a given block is resolved
/// once from the consensus parameters and the header's sequence, so verification never branches
/// on configuration in the hashing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowHasher {
    /// The launch hash function.
    Blake3,
    /// The upgraded, ASIC-resistant hash function.
    FishHash,
}

impl PowHasher {
    /// Resolves the PoW hash function for a block at the given sequence.
    pub fn for_sequence(params: &ConsensusParameters, sequence: u32) -> Self {
        if params.enable_fish_hash.is_active(sequence) {
            PowHasher::FishHash
        } else {
            PowHasher::Blake3
        }
    }

    /// Hashes a serialized block header for target comparison.
    pub fn hash(&self, header_bytes: &[u8]) -> [u8; 32] {
        match self {
            PowHasher::Blake3 => *blake3::hash(header_bytes).as_bytes(),
            PowHasher::FishHash => {
                *blake3::Hasher::new_derive_key(FISH_HASH_CONTEXT)
                    .update(header_bytes)
                    .finalize()
                    .as_bytes()
            },
        }
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::PowHasher;
    use crate::consensus::{ActivationSequence, ConsensusParameters};

    #[test]
    fn hash_functions_are_distinct() {
        let bytes = b"header";
        assert_ne!(PowHasher::Blake3.hash(bytes), PowHasher::FishHash.hash(bytes));
    }

    #[test]
    fn upgrade_resolves_by_sequence() {
        let params = ConsensusParameters {
            enable_fish_hash: ActivationSequence::at(100),
            ..ConsensusParameters::default()
        };
        assert_eq!(PowHasher::for_sequence(&params, 99), PowHasher::Blake3);
        assert_eq!(PowHasher::for_sequence(&params, 100), PowHasher::FishHash);
    }
}
