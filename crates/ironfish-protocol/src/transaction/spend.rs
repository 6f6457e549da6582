use winter_utils::{
    ByteReader,
    ByteWriter,
    Deserializable,
    DeserializationError,
    Serializable,
};

use crate::constants::PROOF_LENGTH;
use crate::hash::{MerkleRoot, NoteCommitment, Nullifier};

// ZK PROOF
// ================================================================================================

/// An opaque, fixed-length zero-knowledge proof.
///
/// The core never inspects proof bytes; they cross the [`crate::proof::ProofVerifier`] boundary
/// unchanged.
#[derive(Clone, PartialEq, Eq)]
pub struct ZkProof(Box<[u8; PROOF_LENGTH]>);

impl ZkProof {
    /// Returns a proof wrapping the provided bytes.
    pub fn new(bytes: [u8; PROOF_LENGTH]) -> Self {
        Self(Box::new(bytes))
    }

    /// Returns a reference to the proof bytes.
    pub fn as_bytes(&self) -> &[u8; PROOF_LENGTH] {
        &self.0
    }
}

impl core::fmt::Debug for ZkProof {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ZkProof({}..)", hex::encode(&self.0[..4]))
    }
}

impl Serializable for ZkProof {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        target.write_bytes(self.0.as_slice());
    }
}

impl Deserializable for ZkProof {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        Ok(Self(Box::new(source.read_array::<PROOF_LENGTH>()?)))
    }
}

// SPEND
// ================================================================================================

/// A spend of an existing note.
///
/// The nullifier marks the note as consumed without revealing which note it was; the proof binds
/// the nullifier to a note whose commitment was a leaf of the note tree when the tree had
/// `tree_size` leaves and root `root_hash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spend {
    /// The deterministic double-spend tag of the consumed note.
    pub nullifier: Nullifier,
    /// The note-tree root the spend proof was built against.
    pub root_hash: MerkleRoot,
    /// The note-tree size the spend proof was built against.
    pub tree_size: u32,
    /// The zero-knowledge spend proof.
    pub proof: ZkProof,
    /// The value commitment of the consumed note.
    pub commitment: NoteCommitment,
}

// SERIALIZATION
// ================================================================================================

impl Serializable for Spend {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        self.nullifier.write_into(target);
        self.root_hash.write_into(target);
        target.write_u32(self.tree_size);
        self.proof.write_into(target);
        self.commitment.write_into(target);
    }
}

impl Deserializable for Spend {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        Ok(Self {
            nullifier: source.read()?,
            root_hash: source.read()?,
            tree_size: source.read_u32()?,
            proof: source.read()?,
            commitment: source.read()?,
        })
    }
}

// TESTS
// ================================================================================================
