use ironfish_protocol::errors::ProofError;
use ironfish_protocol::hash::{BlockHash, Nullifier};
use ironfish_protocol::target::Target;
use ironfish_store::StoreError;
use thiserror::Error;

// TREE ERROR
// ================================================================================================

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("leaf index {index} is out of range for a tree of size {size}")]
    LeafOutOfRange { index: u32, size: u32 },
    #[error("size {size} is out of range for a tree of size {current}")]
    SizeOutOfRange { size: u32, current: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

// VALIDATION ERROR
// ================================================================================================

/// Why a spend failed contextual verification.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SpendReason {
    #[error("claimed note tree root was never a root of the tree")]
    UnknownRoot,
    #[error("claimed note tree root is older than the allowed staleness window")]
    StaleRoot,
    #[error("nullifier was already revealed on this chain")]
    NullifierSeen(Nullifier),
}

/// Why a mint failed contextual verification.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MintReason {
    #[error("minting would overflow the asset's supply")]
    SupplyOverflow,
    #[error("minter does not own the asset")]
    NotOwner,
    #[error("minter is not the asset's creator")]
    NotCreator,
    #[error("ownership transfer is not active at this sequence")]
    OwnershipNotActive,
    #[error("mint value must be positive")]
    ZeroValue,
}

/// Why a burn failed contextual verification.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BurnReason {
    #[error("asset does not exist on this chain")]
    UnknownAsset,
    #[error("burn exceeds the asset's circulating supply")]
    InsufficientSupply,
    #[error("the native asset cannot be burned")]
    NativeAsset,
    #[error("burn value must be positive")]
    ZeroValue,
}

/// A context-free or contextual verification failure.
///
/// Validation errors are never fatal: the block or transaction is rejected, the submitting peer
/// may be demerited, and the node carries on.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("block proof of work does not meet its target")]
    InvalidPow,
    #[error("block target does not match the expected retarget {expected}")]
    InvalidTarget { expected: Target },
    #[error("block timestamp {timestamp_ms} is more than {allowed_seconds}s in the future")]
    TimestampTooFar { timestamp_ms: u64, allowed_seconds: u64 },
    #[error("block timestamp {timestamp_ms} is not later than its parent's {parent_timestamp_ms}")]
    TimestampNotSequential { timestamp_ms: u64, parent_timestamp_ms: u64 },
    #[error("block sequence {sequence} does not follow parent sequence {parent_sequence}")]
    InvalidSequence { sequence: u32, parent_sequence: u32 },
    #[error("block size {size} exceeds the maximum {max}")]
    BlockTooLarge { size: u64, max: u64 },
    #[error("block must start with exactly one miner's fee transaction")]
    MissingMinersFee,
    #[error("block miners fee {actual} does not equal the negated sum {expected} of its fees")]
    InvalidMinersFee { actual: i64, expected: i64 },
    #[error("transaction fee {fee} is below the minimum fee {min}")]
    FeeTooLow { fee: i64, min: i64 },
    #[error("transaction has a negative fee but is not a miner's fee")]
    NegativeFee,
    #[error("transaction expired at sequence {expiration} at or before block sequence {sequence}")]
    TransactionExpired { expiration: u32, sequence: u32 },
    #[error("invalid spend: {0}")]
    InvalidSpend(SpendReason),
    #[error("invalid mint: {0}")]
    InvalidMint(MintReason),
    #[error("invalid burn: {0}")]
    InvalidBurn(BurnReason),
    #[error("{tree} tree does not match the header commitment after applying the block")]
    InvalidRoot { tree: &'static str },
    #[error("proof failed verification")]
    InvalidProof(#[from] ProofError),
    #[error("genesis block does not have the genesis shape")]
    InvalidGenesis,
}

// CHAIN ERROR
// ================================================================================================

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain has no genesis block")]
    EmptyChain,
    #[error("block {0} is not on this chain")]
    UnknownBlock(BlockHash),
    #[error("block failed verification")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
