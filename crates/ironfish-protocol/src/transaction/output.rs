use winter_utils::{
    ByteReader,
    ByteWriter,
    Deserializable,
    DeserializationError,
    Serializable,
};

use crate::constants::ENCRYPTED_NOTE_LENGTH;
use crate::hash::NoteCommitment;
use crate::transaction::spend::ZkProof;

// NOTE CIPHERTEXT
// ================================================================================================

/// The encrypted payload of a newly created note.
///
/// Only a holder of the matching incoming view key can decrypt it; the core carries it opaquely.
#[derive(Clone, PartialEq, Eq)]
pub struct NoteCiphertext(Box<[u8; ENCRYPTED_NOTE_LENGTH]>);

impl NoteCiphertext {
    /// Returns a ciphertext wrapping the provided bytes.
    pub fn new(bytes: [u8; ENCRYPTED_NOTE_LENGTH]) -> Self {
        Self(Box::new(bytes))
    }

    /// Returns a reference to the ciphertext bytes.
    pub fn as_bytes(&self) -> &[u8; ENCRYPTED_NOTE_LENGTH] {
        &self.0
    }
}

impl core::fmt::Debug for NoteCiphertext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "NoteCiphertext({}..)", hex::encode(&self.0[..4]))
    }
}

impl Serializable for NoteCiphertext {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        target.write_bytes(self.0.as_slice());
    }
}

impl Deserializable for NoteCiphertext {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        Ok(Self(Box::new(source.read_array::<ENCRYPTED_NOTE_LENGTH>()?)))
    }
}

// OUTPUT
// ================================================================================================

/// A newly created encrypted note.
///
/// The merkle hash is the commitment inserted as a leaf of the note tree, in the block's
/// transaction order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    /// The note commitment inserted into the note tree.
    pub merkle_hash: NoteCommitment,
    /// The encrypted note payload.
    pub ciphertext: NoteCiphertext,
    /// The zero-knowledge output proof.
    pub proof: ZkProof,
}

// SERIALIZATION
// ================================================================================================

impl Serializable for Output {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        self.merkle_hash.write_into(target);
        self.ciphertext.write_into(target);
        self.proof.write_into(target);
    }
}

impl Deserializable for Output {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        Ok(Self {
            merkle_hash: source.read()?,
            ciphertext: source.read()?,
            proof: source.read()?,
        })
    }
}
