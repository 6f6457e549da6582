use core::fmt::{self, Display};

use winter_utils::{
    ByteReader,
    ByteWriter,
    Deserializable,
    DeserializationError,
    Serializable,
};

// 32-BYTE IDENTIFIERS
// ================================================================================================

/// Defines a 32-byte content identifier newtype.
///
/// All cross-component references in the node are by content hash; these types keep the different
/// hash domains (blocks, transactions, nullifiers, tree nodes) from being confused for one
/// another.
macro_rules! define_hash32 {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name([u8; 32]);

        impl $name {
            /// The all-zero value of this identifier.
            pub const ZERO: $name = $name([0u8; 32]);

            /// Returns a new identifier wrapping the provided bytes.
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Returns a reference to the underlying bytes.
            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Consumes self and returns the underlying bytes.
            pub const fn into_bytes(self) -> [u8; 32] {
                self.0
            }

            /// Returns the identifier rendered as a lowercase hex string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Attempts to parse an identifier from a hex string.
            pub fn try_from_hex(value: &str) -> Result<Self, hex::FromHexError> {
                let mut bytes = [0u8; 32];
                hex::decode_to_slice(value.trim_start_matches("0x"), &mut bytes)?;
                Ok(Self(bytes))
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl From<$name> for [u8; 32] {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl Serializable for $name {
            fn write_into<W: ByteWriter>(&self, target: &mut W) {
                target.write_bytes(&self.0);
            }
        }

        impl Deserializable for $name {
            fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
                Ok(Self(source.read_array::<32>()?))
            }
        }
    };
}

define_hash32!(
    /// The hash of a serialized block header, identifying a block in the fork DAG.
    BlockHash
);

define_hash32!(
    /// The hash of a serialized transaction, excluding its binding signature.
    TransactionHash
);

define_hash32!(
    /// A deterministic tag bound to a spend, preventing double-spends without revealing which
    /// note was spent.
    Nullifier
);

define_hash32!(
    /// The commitment to an encrypted note, inserted as a leaf of the note tree.
    NoteCommitment
);

define_hash32!(
    /// The root of a note or nullifier commitment tree at some size.
    MerkleRoot
);

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use winter_utils::{Deserializable, Serializable};

    use super::BlockHash;

    #[test]
    fn hash_hex_round_trip() {
        let hash = BlockHash::new([0xab; 32]);
        let parsed = BlockHash::try_from_hex(&hash.to_hex()).unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn hash_serde_round_trip() {
        let hash = BlockHash::new([7; 32]);
        let bytes = hash.to_bytes();
        assert_eq!(bytes.len(), 32);
        assert_eq!(BlockHash::read_from_bytes(&bytes).unwrap(), hash);
    }

    #[test]
    fn hash_rejects_bad_hex() {
        assert!(BlockHash::try_from_hex("zz").is_err());
    }
}
