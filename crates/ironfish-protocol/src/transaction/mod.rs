use winter_utils::{
    ByteReader,
    ByteWriter,
    Deserializable,
    DeserializationError,
    Serializable,
};

use crate::constants::{
    BINDING_SIGNATURE_LENGTH,
    MAX_BURNS_PER_TRANSACTION,
    MAX_MINTS_PER_TRANSACTION,
    MAX_OUTPUTS_PER_TRANSACTION,
    MAX_SPENDS_PER_TRANSACTION,
};
use crate::hash::TransactionHash;

mod mint;
pub use mint::{BurnDescription, MintDescription};

mod output;
pub use output::{NoteCiphertext, Output};

mod spend;
pub use spend::{Spend, ZkProof};

/// Reads a length-prefixed list, rejecting lengths above `max`.
pub(crate) fn read_list<R: ByteReader, T: Deserializable>(
    source: &mut R,
    max: usize,
    what: &str,
) -> Result<Vec<T>, DeserializationError> {
    let count = source.read_usize()?;
    if count > max {
        return Err(DeserializationError::InvalidValue(format!(
            "{count} {what} exceeds the maximum of {max}"
        )));
    }
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(source.read()?);
    }
    Ok(items)
}

pub(crate) fn write_list<W: ByteWriter, T: Serializable>(target: &mut W, items: &[T]) {
    target.write_usize(items.len());
    for item in items {
        item.write_into(target);
    }
}

// TRANSACTION
// ================================================================================================

/// A transaction moving value between encrypted notes.
///
/// Spends consume existing notes by revealing their nullifiers, outputs create new encrypted
/// notes, and mints and burns adjust the transparent supply of non-native assets. The fee is
/// transparent; value balance across the hidden components is enforced by the binding signature,
/// checked at the proof boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    version: u8,
    spends: Vec<Spend>,
    outputs: Vec<Output>,
    mints: Vec<MintDescription>,
    burns: Vec<BurnDescription>,
    fee: i64,
    expiration_sequence: u32,
    public_key_randomness: [u8; 32],
    binding_signature: [u8; BINDING_SIGNATURE_LENGTH],
}

impl Transaction {
    /// Creates a new transaction from its parts.
    ///
    /// The parts are not cross-validated here; validity is the verifier's concern.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        version: u8,
        spends: Vec<Spend>,
        outputs: Vec<Output>,
        mints: Vec<MintDescription>,
        burns: Vec<BurnDescription>,
        fee: i64,
        expiration_sequence: u32,
        public_key_randomness: [u8; 32],
        binding_signature: [u8; BINDING_SIGNATURE_LENGTH],
    ) -> Self {
        Self {
            version,
            spends,
            outputs,
            mints,
            burns,
            fee,
            expiration_sequence,
            public_key_randomness,
            binding_signature,
        }
    }

    // PUBLIC ACCESSORS
    // --------------------------------------------------------------------------------------------

    /// Returns the transaction format version.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the spends of this transaction.
    pub fn spends(&self) -> &[Spend] {
        &self.spends
    }

    /// Returns the outputs of this transaction.
    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Returns the mint descriptions of this transaction.
    pub fn mints(&self) -> &[MintDescription] {
        &self.mints
    }

    /// Returns the burn descriptions of this transaction.
    pub fn burns(&self) -> &[BurnDescription] {
        &self.burns
    }

    /// Returns the transparent fee in base units. Negative for a miner's fee transaction.
    pub fn fee(&self) -> i64 {
        self.fee
    }

    /// Returns the sequence after which this transaction may no longer be included, with zero
    /// meaning never.
    pub fn expiration_sequence(&self) -> u32 {
        self.expiration_sequence
    }

    /// Returns the randomized public key bytes used by the binding signature.
    pub fn public_key_randomness(&self) -> &[u8; 32] {
        &self.public_key_randomness
    }

    /// Returns the binding signature bytes.
    pub fn binding_signature(&self) -> &[u8; BINDING_SIGNATURE_LENGTH] {
        &self.binding_signature
    }

    /// Returns true if this transaction has the shape of a miner's fee: a negative fee, no
    /// spends and exactly one output.
    pub fn is_miners_fee(&self) -> bool {
        self.fee < 0 && self.spends.is_empty() && self.outputs.len() == 1
    }

    /// Returns true if the transaction is expired at `sequence`.
    ///
    /// A transaction with expiration sequence `n` may be included in blocks with sequences
    /// strictly below `n`; zero means the transaction never expires.
    pub fn is_expired_at(&self, sequence: u32) -> bool {
        self.expiration_sequence != 0 && self.expiration_sequence <= sequence
    }

    /// Returns the serialized size of this transaction in bytes.
    pub fn serialized_size(&self) -> usize {
        self.to_bytes().len()
    }

    // HASHING
    // --------------------------------------------------------------------------------------------

    /// Returns the hash identifying this transaction.
    ///
    /// The binding signature is excluded, so the hash is stable across re-signing.
    pub fn hash(&self) -> TransactionHash {
        let mut bytes = Vec::with_capacity(self.serialized_size());
        self.write_without_signature(&mut bytes, true);
        TransactionHash::new(*blake3::hash(&bytes).as_bytes())
    }

    /// Returns the hash the binding signature commits to.
    ///
    /// Excludes both the signature and the public key randomness.
    pub fn unsigned_hash(&self) -> TransactionHash {
        let mut bytes = Vec::with_capacity(self.serialized_size());
        self.write_without_signature(&mut bytes, false);
        TransactionHash::new(*blake3::hash(&bytes).as_bytes())
    }

    fn write_without_signature<W: ByteWriter>(&self, target: &mut W, with_randomness: bool) {
        target.write_u8(self.version);
        write_list(target, &self.spends);
        write_list(target, &self.outputs);
        write_list(target, &self.mints);
        write_list(target, &self.burns);
        target.write_u64(self.fee as u64);
        target.write_u32(self.expiration_sequence);
        if with_randomness {
            target.write_bytes(&self.public_key_randomness);
        }
    }
}

// SERIALIZATION
// ================================================================================================

impl Serializable for Transaction {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        self.write_without_signature(target, true);
        target.write_bytes(&self.binding_signature);
    }
}

impl Deserializable for Transaction {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        let version = source.read_u8()?;
        let spends = read_list(source, MAX_SPENDS_PER_TRANSACTION, "spends")?;
        let outputs = read_list(source, MAX_OUTPUTS_PER_TRANSACTION, "outputs")?;
        let mints = read_list(source, MAX_MINTS_PER_TRANSACTION, "mints")?;
        let burns = read_list(source, MAX_BURNS_PER_TRANSACTION, "burns")?;
        let fee = source.read_u64()? as i64;
        let expiration_sequence = source.read_u32()?;
        let public_key_randomness = source.read_array::<32>()?;
        let binding_signature = source.read_array::<BINDING_SIGNATURE_LENGTH>()?;

        Ok(Self {
            version,
            spends,
            outputs,
            mints,
            burns,
            fee,
            expiration_sequence,
            public_key_randomness,
            binding_signature,
        })
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use winter_utils::{Deserializable, Serializable};

    use super::Transaction;
    use crate::testing::{miners_fee_transaction, transaction_with_fee};

    #[test]
    fn serde_round_trip() {
        let tx = transaction_with_fee(5, 100);
        let bytes = tx.to_bytes();
        let recovered = Transaction::read_from_bytes(&bytes).unwrap();
        assert_eq!(recovered, tx);
        // Bit-for-bit round trip.
        assert_eq!(recovered.to_bytes(), bytes);
    }

    #[test]
    fn hash_excludes_binding_signature() {
        let tx = transaction_with_fee(5, 100);
        let mut resigned = tx.clone();
        resigned.binding_signature = [0xaa; 64];
        assert_eq!(tx.hash(), resigned.hash());
        assert_ne!(tx.to_bytes(), resigned.to_bytes());
    }

    #[test]
    fn unsigned_hash_excludes_randomness() {
        let tx = transaction_with_fee(5, 100);
        let mut rerandomized = tx.clone();
        rerandomized.public_key_randomness = [0xbb; 32];
        assert_eq!(tx.unsigned_hash(), rerandomized.unsigned_hash());
        assert_ne!(tx.hash(), rerandomized.hash());
    }

    #[test]
    fn hash_is_stable_across_serde() {
        let tx = transaction_with_fee(7, 0);
        let recovered = Transaction::read_from_bytes(&tx.to_bytes()).unwrap();
        assert_eq!(tx.hash(), recovered.hash());
    }

    #[test]
    fn miners_fee_shape() {
        assert!(miners_fee_transaction(-20, 1).is_miners_fee());
        assert!(!transaction_with_fee(5, 0).is_miners_fee());
    }

    #[test]
    fn expiration_semantics() {
        let tx = transaction_with_fee(1, 10);
        assert!(!tx.is_expired_at(9));
        assert!(tx.is_expired_at(10));
        assert!(tx.is_expired_at(11));

        let never = transaction_with_fee(1, 0);
        assert!(!never.is_expired_at(u32::MAX));
    }

    #[test]
    fn negative_fee_round_trips() {
        let tx = miners_fee_transaction(-2_000_000_000, 1);
        let recovered = Transaction::read_from_bytes(&tx.to_bytes()).unwrap();
        assert_eq!(recovered.fee(), -2_000_000_000);
    }
}
