pub mod asset;
pub mod block;
pub mod consensus;
pub mod crypto;
pub mod errors;
pub mod hash;
pub mod merkle;
pub mod pow;
pub mod proof;
pub mod target;
pub mod transaction;

#[cfg(any(feature = "testing", test))]
pub mod testing;

mod constants;

// RE-EXPORTS
// ================================================================================================

pub use asset::{Asset, AssetId, AssetName, AssetMetadata, PublicAddress};
pub use block::{Block, BlockHeader, CommitmentState, Graffiti, make_genesis_block};
pub use consensus::{ActivationSequence, ConsensusParameters};
pub use constants::*;
pub use errors::{AssetError, GenesisError, ProofError};
pub use hash::{BlockHash, MerkleRoot, NoteCommitment, Nullifier, TransactionHash};
pub use merkle::{MerkleHasher, NoteTreeHasher, NullifierTreeHasher};
pub use pow::PowHasher;
pub use proof::{MinersFeeFactory, ProofVerifier, SpendingKey};
pub use target::{Target, Work};
pub use transaction::{
    BurnDescription,
    MintDescription,
    NoteCiphertext,
    Output,
    Spend,
    Transaction,
    ZkProof,
};

pub mod utils {
    pub mod serde {
        pub use winter_utils::{
            ByteReader,
            ByteWriter,
            Deserializable,
            DeserializationError,
            Serializable,
        };
    }
}
