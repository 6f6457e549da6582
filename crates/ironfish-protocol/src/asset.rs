use core::fmt::{self, Display};
use std::sync::OnceLock;

use winter_utils::{
    ByteReader,
    ByteWriter,
    Deserializable,
    DeserializationError,
    Serializable,
};

use crate::errors::AssetError;
use crate::hash::{BlockHash, TransactionHash};

/// Domain separation prefix for asset identifier derivation.
const ASSET_ID_CONTEXT: &str = "ironfish asset identifier";

/// Serialized length of an asset name, zero-padded on the right.
pub const ASSET_NAME_LENGTH: usize = 32;

/// Serialized length of asset metadata, zero-padded on the right.
pub const ASSET_METADATA_LENGTH: usize = 96;

// PUBLIC ADDRESS
// ================================================================================================

/// The public address of an asset creator or owner.
///
/// Addresses are opaque to the core; ownership checks compare them for equality only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PublicAddress(pub [u8; 32]);

impl Serializable for PublicAddress {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        target.write_bytes(&self.0);
    }
}

impl Deserializable for PublicAddress {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        Ok(Self(source.read_array::<32>()?))
    }
}

impl Display for PublicAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

// ASSET NAME AND METADATA
// ================================================================================================

/// The fixed-width, zero-padded name of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetName(pub [u8; ASSET_NAME_LENGTH]);

impl AssetName {
    /// Returns a name from a UTF-8 string, truncating to the fixed width.
    pub fn from_str_lossy(value: &str) -> Self {
        let mut bytes = [0u8; ASSET_NAME_LENGTH];
        let len = value.len().min(ASSET_NAME_LENGTH);
        bytes[..len].copy_from_slice(&value.as_bytes()[..len]);
        Self(bytes)
    }
}

impl Serializable for AssetName {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        target.write_bytes(&self.0);
    }
}

impl Deserializable for AssetName {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        Ok(Self(source.read_array::<ASSET_NAME_LENGTH>()?))
    }
}

/// The fixed-width, zero-padded metadata of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetMetadata(pub [u8; ASSET_METADATA_LENGTH]);

impl AssetMetadata {
    /// Empty metadata.
    pub const EMPTY: AssetMetadata = AssetMetadata([0u8; ASSET_METADATA_LENGTH]);
}

impl Serializable for AssetMetadata {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        target.write_bytes(&self.0);
    }
}

impl Deserializable for AssetMetadata {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        Ok(Self(source.read_array::<ASSET_METADATA_LENGTH>()?))
    }
}

// ASSET ID
// ================================================================================================

/// The deterministic identifier of an asset.
///
/// Derived by hashing the creator, name, metadata and nonce of the asset's first mint, so any
/// two mints describing the same asset resolve to the same identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AssetId([u8; 32]);

impl AssetId {
    /// Returns a new asset ID wrapping the provided bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns a reference to the underlying bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derives the identifier of the asset described by the provided fields.
    pub fn derive(
        creator: &PublicAddress,
        name: &AssetName,
        metadata: &AssetMetadata,
        nonce: u8,
    ) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(ASSET_ID_CONTEXT);
        hasher.update(&creator.0);
        hasher.update(&name.0);
        hasher.update(&metadata.0);
        hasher.update(&[nonce]);
        Self(*hasher.finalize().as_bytes())
    }

    /// Returns true if this is the network's native asset.
    pub fn is_native(&self) -> bool {
        *self == Self::native()
    }

    /// Returns the identifier of the network's native asset.
    pub fn native() -> Self {
        static NATIVE: OnceLock<AssetId> = OnceLock::new();
        *NATIVE.get_or_init(|| {
            AssetId::derive(
                &PublicAddress([0u8; 32]),
                &AssetName::from_str_lossy("$IRON"),
                &AssetMetadata::EMPTY,
                0,
            )
        })
    }
}

impl Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({})", hex::encode(self.0))
    }
}

impl Serializable for AssetId {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        target.write_bytes(&self.0);
    }
}

impl Deserializable for AssetId {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        Ok(Self(source.read_array::<32>()?))
    }
}

// ASSET
// ================================================================================================

/// A registered asset and its running supply on the main chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// The deterministic identifier of the asset.
    pub id: AssetId,
    /// The address that first minted the asset.
    pub creator: PublicAddress,
    /// The address currently allowed to mint the asset.
    pub owner: PublicAddress,
    /// The fixed-width asset name.
    pub name: AssetName,
    /// The fixed-width asset metadata.
    pub metadata: AssetMetadata,
    /// The derivation nonce.
    pub nonce: u8,
    /// Units of the asset in circulation on the main chain.
    pub supply: u64,
    /// The transaction whose mint created the asset.
    pub created_transaction_hash: TransactionHash,
    /// The main-chain block whose mint registered the asset. The whole record is deleted when
    /// that block disconnects, so stored records always carry it.
    pub first_block_hash: Option<BlockHash>,
    /// The sequence of `first_block_hash`.
    pub first_sequence: Option<u32>,
}

impl Asset {
    /// Adds minted units to the circulating supply.
    ///
    /// # Errors
    ///
    /// Returns an error if the new supply would overflow a u64.
    pub fn mint(&mut self, value: u64) -> Result<(), AssetError> {
        self.supply = self
            .supply
            .checked_add(value)
            .ok_or(AssetError::SupplyOverflow { asset_id: self.id, value })?;
        Ok(())
    }

    /// Removes burned units from the circulating supply.
    ///
    /// # Errors
    ///
    /// Returns an error if more units would be burned than are in circulation.
    pub fn burn(&mut self, value: u64) -> Result<(), AssetError> {
        self.supply = self
            .supply
            .checked_sub(value)
            .ok_or(AssetError::InsufficientSupply { asset_id: self.id, value })?;
        Ok(())
    }
}

// SERIALIZATION
// ================================================================================================

impl Serializable for Asset {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        self.id.write_into(target);
        self.creator.write_into(target);
        self.owner.write_into(target);
        self.name.write_into(target);
        self.metadata.write_into(target);
        target.write_u8(self.nonce);
        target.write_u64(self.supply);
        self.created_transaction_hash.write_into(target);
        self.first_block_hash.write_into(target);
        self.first_sequence.write_into(target);
    }
}

impl Deserializable for Asset {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        Ok(Self {
            id: source.read()?,
            creator: source.read()?,
            owner: source.read()?,
            name: source.read()?,
            metadata: source.read()?,
            nonce: source.read_u8()?,
            supply: source.read_u64()?,
            created_transaction_hash: source.read()?,
            first_block_hash: source.read()?,
            first_sequence: source.read()?,
        })
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use winter_utils::{Deserializable, Serializable};

    use super::{Asset, AssetId, AssetMetadata, AssetName, PublicAddress};
    use crate::errors::AssetError;
    use crate::hash::TransactionHash;

    fn test_asset() -> Asset {
        let creator = PublicAddress([1; 32]);
        let name = AssetName::from_str_lossy("testcoin");
        Asset {
            id: AssetId::derive(&creator, &name, &AssetMetadata::EMPTY, 0),
            creator,
            owner: creator,
            name,
            metadata: AssetMetadata::EMPTY,
            nonce: 0,
            supply: 0,
            created_transaction_hash: TransactionHash::ZERO,
            first_block_hash: None,
            first_sequence: None,
        }
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = test_asset();
        let b = test_asset();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn derivation_separates_nonce() {
        let creator = PublicAddress([1; 32]);
        let name = AssetName::from_str_lossy("testcoin");
        let a = AssetId::derive(&creator, &name, &AssetMetadata::EMPTY, 0);
        let b = AssetId::derive(&creator, &name, &AssetMetadata::EMPTY, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn supply_overflow_is_rejected() {
        let mut asset = test_asset();
        asset.mint(u64::MAX).unwrap();
        assert_matches!(asset.mint(1), Err(AssetError::SupplyOverflow { .. }));
    }

    #[test]
    fn burn_beyond_supply_is_rejected() {
        let mut asset = test_asset();
        asset.mint(10).unwrap();
        asset.burn(4).unwrap();
        assert_eq!(asset.supply, 6);
        assert_matches!(asset.burn(7), Err(AssetError::InsufficientSupply { .. }));
    }

    #[test]
    fn asset_serde_round_trip() {
        let mut asset = test_asset();
        asset.supply = 42;
        asset.first_sequence = Some(7);
        let bytes = asset.to_bytes();
        assert_eq!(Asset::read_from_bytes(&bytes).unwrap(), asset);
    }
}
