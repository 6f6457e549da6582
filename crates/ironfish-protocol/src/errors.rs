use thiserror::Error;

use crate::asset::AssetId;

// ASSET ERROR
// ================================================================================================

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("minting {value} units of asset {asset_id} overflows its supply")]
    SupplyOverflow { asset_id: AssetId, value: u64 },
    #[error("burning {value} units of asset {asset_id} exceeds its circulating supply")]
    InsufficientSupply { asset_id: AssetId, value: u64 },
}

// PROOF ERROR
// ================================================================================================

#[derive(Debug, Error)]
pub enum ProofError {
    #[error("spend proof failed verification")]
    InvalidSpendProof,
    #[error("output proof failed verification")]
    InvalidOutputProof,
    #[error("mint proof failed verification")]
    InvalidMintProof,
    #[error("binding signature failed verification")]
    InvalidBindingSignature,
    #[error("miners fee could not be constructed: {0}")]
    MinersFeeFailed(String),
}

// GENESIS ERROR
// ================================================================================================

#[derive(Debug, Error)]
pub enum GenesisError {
    #[error("genesis supply of {0} iron does not fit in base units")]
    SupplyOutOfRange(u64),
}
