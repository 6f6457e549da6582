//! On-disk layout of the blockchain database.

use ironfish_protocol::asset::Asset;
use ironfish_protocol::block::BlockHeader;
use ironfish_protocol::hash::{BlockHash, MerkleRoot};
use ironfish_protocol::target::Work;
use ironfish_protocol::transaction::Transaction;
use ironfish_protocol::utils::serde::{
    ByteReader,
    ByteWriter,
    Deserializable,
    DeserializationError,
    Serializable,
};
use ironfish_store::{NullValue, StoreDef};

// STORES
// ================================================================================================

/// Block headers with their accumulated work, keyed by block hash.
pub const HEADERS: StoreDef<[u8; 32], HeaderRecord> = StoreDef::new("headers");

/// Ordered transactions of each stored block, keyed by block hash.
pub const BLOCK_TRANSACTIONS: StoreDef<[u8; 32], Vec<Transaction>> =
    StoreDef::new("block_transactions");

/// Child links of the fork DAG: (parent hash, child hash) pairs with set semantics.
pub const CHILD_HASHES: StoreDef<([u8; 32], [u8; 32]), NullValue> =
    StoreDef::new("hash_to_next_hashes");

/// All hashes stored at a sequence, across every fork. Forks share sequences, so this is a
/// multimap with set semantics.
pub const SEQUENCE_TO_HASHES: StoreDef<(u32, [u8; 32]), NullValue> =
    StoreDef::new("sequence_to_hashes");

/// The main chain by sequence. Present only for connected blocks.
pub const MAIN_CHAIN: StoreDef<u32, BlockHash> = StoreDef::new("main_chain");

/// Transaction lookup, keyed by transaction hash. Correct only for main-chain blocks; entries
/// are removed when their block is disconnected.
pub const TRANSACTIONS: StoreDef<[u8; 32], TransactionRecord> = StoreDef::new("transactions");

/// The asset registry, keyed by asset identifier.
pub const ASSETS: StoreDef<[u8; 32], Asset> = StoreDef::new("assets");

/// Named chain pointers, keyed by [`meta_keys`] constants.
pub const META: StoreDef<u8, BlockHash> = StoreDef::new("meta");

/// Position of each revealed nullifier in the nullifier tree.
pub const NULLIFIER_POSITIONS: StoreDef<[u8; 32], u32> = StoreDef::new("nullifier_positions");

/// Note tree leaves by index.
pub const NOTE_LEAVES: StoreDef<u32, MerkleRoot> = StoreDef::new("note_tree_leaves");

/// Note tree internal nodes by (depth, index); only nodes of complete subtrees are stored.
pub const NOTE_NODES: StoreDef<(u8, u32), MerkleRoot> = StoreDef::new("note_tree_nodes");

/// Note tree leaf counter.
pub const NOTE_TREE_META: StoreDef<u8, u32> = StoreDef::new("note_tree_meta");

/// Nullifier tree leaves by index.
pub const NULLIFIER_LEAVES: StoreDef<u32, MerkleRoot> = StoreDef::new("nullifier_tree_leaves");

/// Nullifier tree internal nodes by (depth, index).
pub const NULLIFIER_NODES: StoreDef<(u8, u32), MerkleRoot> =
    StoreDef::new("nullifier_tree_nodes");

/// Nullifier tree leaf counter.
pub const NULLIFIER_TREE_META: StoreDef<u8, u32> = StoreDef::new("nullifier_tree_meta");

/// Every store of the blockchain database, pre-created at open.
pub const ALL_STORES: &[&str] = &[
    "headers",
    "block_transactions",
    "hash_to_next_hashes",
    "sequence_to_hashes",
    "main_chain",
    "transactions",
    "assets",
    "meta",
    "nullifier_positions",
    "note_tree_leaves",
    "note_tree_nodes",
    "note_tree_meta",
    "nullifier_tree_leaves",
    "nullifier_tree_nodes",
    "nullifier_tree_meta",
];

pub mod meta_keys {
    /// The hash of the current head of the main chain.
    pub const HEAD: u8 = 0;
    /// The hash of the highest-sequence header seen on any fork.
    pub const LATEST: u8 = 1;
    /// The hash of the genesis block.
    pub const GENESIS: u8 = 2;
}

// BLOCK STATUS
// ================================================================================================

/// Where a stored block currently sits in the fork DAG.
///
/// A block arrives `Fork` (or directly `Main` when it extends the head) and moves between the
/// two as reorgs connect and disconnect it. Blocks that fail verification are never stored, and
/// blocks whose parent is unknown wait in the in-memory orphan pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// On the main chain.
    Main,
    /// Stored on a side chain.
    Fork,
}

impl Serializable for BlockStatus {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        target.write_u8(match self {
            BlockStatus::Main => 0,
            BlockStatus::Fork => 1,
        });
    }
}

impl Deserializable for BlockStatus {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        match source.read_u8()? {
            0 => Ok(BlockStatus::Main),
            1 => Ok(BlockStatus::Fork),
            other => {
                Err(DeserializationError::InvalidValue(format!("unknown block status {other}")))
            },
        }
    }
}

// HEADER RECORD
// ================================================================================================

/// A stored block header with its accumulated work and chain status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRecord {
    pub header: BlockHeader,
    pub work_total: Work,
    pub status: BlockStatus,
}

impl Serializable for HeaderRecord {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        self.header.write_into(target);
        self.work_total.write_into(target);
        self.status.write_into(target);
    }
}

impl Deserializable for HeaderRecord {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        Ok(Self {
            header: source.read()?,
            work_total: source.read()?,
            status: source.read()?,
        })
    }
}

// TRANSACTION RECORD
// ================================================================================================

/// A main-chain transaction with the block that confirmed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub block_hash: BlockHash,
    pub sequence: u32,
    pub transaction: Transaction,
}

impl Serializable for TransactionRecord {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        self.block_hash.write_into(target);
        target.write_u32(self.sequence);
        self.transaction.write_into(target);
    }
}

impl Deserializable for TransactionRecord {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        Ok(Self {
            block_hash: source.read()?,
            sequence: source.read_u32()?,
            transaction: source.read()?,
        })
    }
}
