use core::marker::PhantomData;

use redb::TableDefinition;

use crate::key::StoreKey;
use crate::value::StoreValue;

// STORE DEFINITION
// ================================================================================================

/// The static declaration of a typed store: a name plus its key and value types.
///
/// Declared as constants next to the code that owns the store, and passed to every read or write
/// so key/value typing never leaves the call site.
pub struct StoreDef<K, V> {
    name: &'static str,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K: StoreKey, V: StoreValue> StoreDef<K, V> {
    /// Declares a store with the given name.
    pub const fn new(name: &'static str) -> Self {
        Self { name, _marker: PhantomData }
    }

    /// Returns the store's name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn table(&self) -> TableDefinition<'static, &'static [u8], &'static [u8]> {
        TableDefinition::new(self.name)
    }
}

impl<K, V> Clone for StoreDef<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for StoreDef<K, V> {}
