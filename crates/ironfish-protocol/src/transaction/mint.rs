use winter_utils::{
    ByteReader,
    ByteWriter,
    Deserializable,
    DeserializationError,
    Serializable,
};

use crate::asset::{AssetId, AssetMetadata, AssetName, PublicAddress};
use crate::transaction::spend::ZkProof;

// MINT DESCRIPTION
// ================================================================================================

/// A mint of new units of an asset.
///
/// The first mint of an asset registers it; later mints must come from the asset's current
/// owner once ownership rules are active. The asset identifier is always re-derived from the
/// description, never trusted from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintDescription {
    /// The address that created the asset.
    pub creator: PublicAddress,
    /// The fixed-width asset name.
    pub name: AssetName,
    /// The fixed-width asset metadata.
    pub metadata: AssetMetadata,
    /// The derivation nonce distinguishing same-named assets.
    pub nonce: u8,
    /// The address allowed to mint after this transaction.
    pub owner: PublicAddress,
    /// Units to create.
    pub value: u64,
    /// New owner, when this mint transfers ownership.
    pub transfer_ownership_to: Option<PublicAddress>,
    /// The zero-knowledge mint proof.
    pub proof: ZkProof,
}

impl MintDescription {
    /// Returns the identifier of the asset this mint describes.
    pub fn asset_id(&self) -> AssetId {
        AssetId::derive(&self.creator, &self.name, &self.metadata, self.nonce)
    }
}

impl Serializable for MintDescription {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        self.creator.write_into(target);
        self.name.write_into(target);
        self.metadata.write_into(target);
        target.write_u8(self.nonce);
        self.owner.write_into(target);
        target.write_u64(self.value);
        self.transfer_ownership_to.write_into(target);
        self.proof.write_into(target);
    }
}

impl Deserializable for MintDescription {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        Ok(Self {
            creator: source.read()?,
            name: source.read()?,
            metadata: source.read()?,
            nonce: source.read_u8()?,
            owner: source.read()?,
            value: source.read_u64()?,
            transfer_ownership_to: source.read()?,
            proof: source.read()?,
        })
    }
}

// BURN DESCRIPTION
// ================================================================================================

/// A burn removing units of an asset from circulation.
///
/// Burns are transparent; the native asset cannot be burned this way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurnDescription {
    /// The asset being burned.
    pub asset_id: AssetId,
    /// Units to remove.
    pub value: u64,
}

impl Serializable for BurnDescription {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        self.asset_id.write_into(target);
        target.write_u64(self.value);
    }
}

impl Deserializable for BurnDescription {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        Ok(Self {
            asset_id: source.read()?,
            value: source.read_u64()?,
        })
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use winter_utils::{Deserializable, Serializable};

    use super::MintDescription;
    use crate::asset::{AssetMetadata, AssetName, PublicAddress};
    use crate::transaction::spend::ZkProof;

    #[test]
    fn mint_serde_round_trip_with_ownership_transfer() {
        let mint = MintDescription {
            creator: PublicAddress([1; 32]),
            name: AssetName::from_str_lossy("coin"),
            metadata: AssetMetadata::EMPTY,
            nonce: 3,
            owner: PublicAddress([1; 32]),
            value: 1_000,
            transfer_ownership_to: Some(PublicAddress([9; 32])),
            proof: ZkProof::new([0; 192]),
        };
        let bytes = mint.to_bytes();
        assert_eq!(MintDescription::read_from_bytes(&bytes).unwrap(), mint);
    }

    #[test]
    fn asset_id_ignores_value_and_owner_transfer() {
        let mut mint = MintDescription {
            creator: PublicAddress([1; 32]),
            name: AssetName::from_str_lossy("coin"),
            metadata: AssetMetadata::EMPTY,
            nonce: 3,
            owner: PublicAddress([1; 32]),
            value: 1_000,
            transfer_ownership_to: None,
            proof: ZkProof::new([0; 192]),
        };
        let id = mint.asset_id();
        mint.value = 2_000;
        mint.transfer_ownership_to = Some(PublicAddress([9; 32]));
        assert_eq!(mint.asset_id(), id);
    }
}
