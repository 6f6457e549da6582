use winter_utils::{
    ByteReader,
    ByteWriter,
    Deserializable,
    DeserializationError,
    Serializable,
};

// STORE VALUE
// ================================================================================================

/// A value storable in a typed store.
///
/// Blanket-implemented for everything with the canonical serialization traits, so domain types
/// need no storage-specific code.
pub trait StoreValue: Sized {
    /// Returns the stored byte representation of this value.
    fn to_store_bytes(&self) -> Vec<u8>;

    /// Decodes a value from its stored byte representation.
    fn from_store_bytes(bytes: &[u8]) -> Result<Self, String>;
}

impl<T: Serializable + Deserializable> StoreValue for T {
    fn to_store_bytes(&self) -> Vec<u8> {
        self.to_bytes()
    }

    fn from_store_bytes(bytes: &[u8]) -> Result<Self, String> {
        T::read_from_bytes(bytes).map_err(|err| err.to_string())
    }
}

// NULL VALUE
// ================================================================================================

/// The empty value used by set-semantics secondary indexes, where only key presence matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NullValue;

impl Serializable for NullValue {
    fn write_into<W: ByteWriter>(&self, _target: &mut W) {}
}

impl Deserializable for NullValue {
    fn read_from<R: ByteReader>(_source: &mut R) -> Result<Self, DeserializationError> {
        Ok(NullValue)
    }
}
