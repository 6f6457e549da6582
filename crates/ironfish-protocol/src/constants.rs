/// Height of the note and nullifier commitment trees.
pub const TREE_DEPTH: u8 = 32;

/// Serialized length of a zero-knowledge proof, in bytes.
pub const PROOF_LENGTH: usize = 192;

/// Serialized length of an encrypted note ciphertext, in bytes.
pub const ENCRYPTED_NOTE_LENGTH: usize = 328;

/// Serialized length of a transaction binding signature, in bytes.
pub const BINDING_SIGNATURE_LENGTH: usize = 64;

/// Maximum number of spends a single transaction may carry.
pub const MAX_SPENDS_PER_TRANSACTION: usize = 256;

/// Maximum number of outputs a single transaction may carry.
pub const MAX_OUTPUTS_PER_TRANSACTION: usize = 256;

/// Maximum number of mint descriptions a single transaction may carry.
pub const MAX_MINTS_PER_TRANSACTION: usize = 16;

/// Maximum number of burn descriptions a single transaction may carry.
pub const MAX_BURNS_PER_TRANSACTION: usize = 16;

/// Sequence of the genesis block. Sequences are 1-based.
pub const GENESIS_SEQUENCE: u32 = 1;

/// Number of base units per coin.
pub const ORE_PER_IRON: u64 = 100_000_000;
