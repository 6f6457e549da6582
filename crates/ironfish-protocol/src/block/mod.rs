use winter_utils::{
    ByteReader,
    ByteWriter,
    Deserializable,
    DeserializationError,
    Serializable,
};

use crate::constants::GENESIS_SEQUENCE;
use crate::hash::{BlockHash, MerkleRoot};
use crate::pow::PowHasher;
use crate::target::{Target, Work};
use crate::transaction::{Transaction, read_list, write_list};

mod genesis;
pub use genesis::make_genesis_block;

/// Upper bound on transactions read from one serialized block.
///
/// Real blocks are bounded by `max_block_size_bytes` long before this; the cap only keeps a
/// malformed length prefix from asking for absurd allocations.
const MAX_TRANSACTIONS_PER_BLOCK: usize = 1 << 16;

// GRAFFITI
// ================================================================================================

/// The 32 free-form bytes a miner may stamp into a block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Graffiti(pub [u8; 32]);

impl Graffiti {
    /// Returns graffiti from a UTF-8 string, truncating to 32 bytes.
    pub fn from_str_lossy(value: &str) -> Self {
        let mut bytes = [0u8; 32];
        let len = value.len().min(32);
        bytes[..len].copy_from_slice(&value.as_bytes()[..len]);
        Self(bytes)
    }
}

impl Serializable for Graffiti {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        target.write_bytes(&self.0);
    }
}

impl Deserializable for Graffiti {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        Ok(Self(source.read_array::<32>()?))
    }
}

// COMMITMENT STATE
// ================================================================================================

/// The root and leaf count of a commitment tree at the point a block was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitmentState {
    /// The tree root after applying the block.
    pub root: MerkleRoot,
    /// The number of leaves after applying the block.
    pub size: u32,
}

impl Serializable for CommitmentState {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        self.root.write_into(target);
        target.write_u32(self.size);
    }
}

impl Deserializable for CommitmentState {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        Ok(Self {
            root: source.read()?,
            size: source.read_u32()?,
        })
    }
}

// BLOCK HEADER
// ================================================================================================

/// The header of a block.
///
/// A header commits to the chain state after applying the block:
///
/// - `sequence` is the 1-based distance from genesis along the chain.
/// - `previous_block_hash` links to the parent header; all-zero only for genesis.
/// - `note_commitment` and `nullifier_commitment` are the roots and sizes of the two commitment
///   trees after the block's transactions are applied in order.
/// - `target` is the proof-of-work target the block was mined against.
/// - `randomness` is the mining nonce.
/// - `timestamp_ms` is the miner's clock in milliseconds since UNIX epoch.
/// - `graffiti` is free-form miner data.
/// - `miners_fee` is the (negative) fee of the block's first transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    sequence: u32,
    previous_block_hash: BlockHash,
    note_commitment: CommitmentState,
    nullifier_commitment: CommitmentState,
    target: Target,
    randomness: u64,
    timestamp_ms: u64,
    graffiti: Graffiti,
    miners_fee: i64,
}

impl BlockHeader {
    /// Creates a new block header.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sequence: u32,
        previous_block_hash: BlockHash,
        note_commitment: CommitmentState,
        nullifier_commitment: CommitmentState,
        target: Target,
        randomness: u64,
        timestamp_ms: u64,
        graffiti: Graffiti,
        miners_fee: i64,
    ) -> Self {
        Self {
            sequence,
            previous_block_hash,
            note_commitment,
            nullifier_commitment,
            target,
            randomness,
            timestamp_ms,
            graffiti,
            miners_fee,
        }
    }

    // PUBLIC ACCESSORS
    // --------------------------------------------------------------------------------------------

    /// Returns the 1-based sequence of the block.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Returns the hash of the parent block header.
    pub fn previous_block_hash(&self) -> BlockHash {
        self.previous_block_hash
    }

    /// Returns the note tree commitment after this block.
    pub fn note_commitment(&self) -> CommitmentState {
        self.note_commitment
    }

    /// Returns the nullifier tree commitment after this block.
    pub fn nullifier_commitment(&self) -> CommitmentState {
        self.nullifier_commitment
    }

    /// Returns the proof-of-work target of the block.
    pub fn target(&self) -> Target {
        self.target
    }

    /// Returns the mining nonce.
    pub fn randomness(&self) -> u64 {
        self.randomness
    }

    /// Returns the block timestamp in milliseconds since UNIX epoch.
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// Returns the miner's graffiti.
    pub fn graffiti(&self) -> Graffiti {
        self.graffiti
    }

    /// Returns the fee of the block's miner's fee transaction. Always negative.
    pub fn miners_fee(&self) -> i64 {
        self.miners_fee
    }

    /// Returns true if this header has the shape of a genesis header.
    pub fn is_genesis(&self) -> bool {
        self.sequence == GENESIS_SEQUENCE && self.previous_block_hash == BlockHash::ZERO
    }

    /// Returns the expected work of this block.
    pub fn work(&self) -> Work {
        self.target.work()
    }

    // HASHING
    // --------------------------------------------------------------------------------------------

    /// Returns the hash identifying this block.
    pub fn hash(&self) -> BlockHash {
        BlockHash::new(*blake3::hash(&self.to_bytes()).as_bytes())
    }

    /// Returns the proof-of-work hash of this header under the provided hash function.
    pub fn pow_hash(&self, hasher: PowHasher) -> [u8; 32] {
        hasher.hash(&self.to_bytes())
    }
}

// SERIALIZATION
// ================================================================================================

impl Serializable for BlockHeader {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        target.write_u32(self.sequence);
        self.previous_block_hash.write_into(target);
        self.note_commitment.write_into(target);
        self.nullifier_commitment.write_into(target);
        self.target.write_into(target);
        target.write_u64(self.randomness);
        target.write_u64(self.timestamp_ms);
        self.graffiti.write_into(target);
        target.write_u64(self.miners_fee as u64);
    }
}

impl Deserializable for BlockHeader {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        Ok(Self {
            sequence: source.read_u32()?,
            previous_block_hash: source.read()?,
            note_commitment: source.read()?,
            nullifier_commitment: source.read()?,
            target: source.read()?,
            randomness: source.read_u64()?,
            timestamp_ms: source.read_u64()?,
            graffiti: source.read()?,
            miners_fee: source.read_u64()? as i64,
        })
    }
}

// BLOCK
// ================================================================================================

/// A block: a header and the ordered transactions it commits to.
///
/// The first transaction is the miner's fee; it is the only transaction allowed a negative fee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<Transaction>,
}

impl Block {
    /// Creates a new block from a header and transactions.
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self { header, transactions }
    }

    /// Returns the block header.
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    /// Returns the ordered transactions of the block.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Returns the hash identifying this block.
    pub fn hash(&self) -> BlockHash {
        self.header.hash()
    }

    /// Returns the serialized size of the block in bytes.
    pub fn serialized_size(&self) -> usize {
        self.to_bytes().len()
    }

    /// Consumes self and returns the header and transactions.
    pub fn into_parts(self) -> (BlockHeader, Vec<Transaction>) {
        (self.header, self.transactions)
    }
}

// SERIALIZATION
// ================================================================================================

impl Serializable for Block {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        self.header.write_into(target);
        write_list(target, &self.transactions);
    }
}

impl Deserializable for Block {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        Ok(Self {
            header: source.read()?,
            transactions: read_list(source, MAX_TRANSACTIONS_PER_BLOCK, "transactions")?,
        })
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use winter_utils::{Deserializable, Serializable};

    use super::{Block, BlockHeader};
    use crate::pow::PowHasher;
    use crate::testing::{header_with_sequence, transaction_with_fee};

    #[test]
    fn header_serde_round_trip() {
        let header = header_with_sequence(9);
        let bytes = header.to_bytes();
        let recovered = BlockHeader::read_from_bytes(&bytes).unwrap();
        assert_eq!(recovered, header);
        assert_eq!(recovered.to_bytes(), bytes);
    }

    #[test]
    fn hash_is_stable_across_serde() {
        let header = header_with_sequence(3);
        let recovered = BlockHeader::read_from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(header.hash(), recovered.hash());
    }

    #[test]
    fn hash_depends_on_randomness() {
        let a = header_with_sequence(3);
        let mut b = a.clone();
        b.randomness = b.randomness.wrapping_add(1);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn pow_hash_differs_from_identity_hash_function() {
        let header = header_with_sequence(3);
        assert_ne!(header.pow_hash(PowHasher::Blake3), header.pow_hash(PowHasher::FishHash));
    }

    #[test]
    fn block_serde_round_trip() {
        let block = Block::new(
            header_with_sequence(2),
            vec![transaction_with_fee(5, 0), transaction_with_fee(6, 9)],
        );
        let bytes = block.to_bytes();
        let recovered = Block::read_from_bytes(&bytes).unwrap();
        assert_eq!(recovered, block);
        assert_eq!(recovered.hash(), block.hash());
    }
}
