use crate::errors::StoreError;

// STORE KEY
// ================================================================================================

/// A fixed-width key whose byte encoding sorts the same way the value does.
///
/// Integer components encode big-endian so lexicographic byte order matches numeric order.
/// Composite keys concatenate their components, which makes range scans by leading component
/// possible; every component therefore has a fixed encoded length.
pub trait StoreKey: Sized {
    /// The encoded length of this key in bytes.
    const ENCODED_LEN: usize;

    /// Appends the encoding of this key to `out`.
    fn encode_into(&self, out: &mut Vec<u8>);

    /// Decodes a key from exactly [`Self::ENCODED_LEN`] bytes.
    fn decode(bytes: &[u8]) -> Result<Self, String>;

    /// Returns the encoding of this key.
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::ENCODED_LEN);
        self.encode_into(&mut out);
        out
    }
}

pub(crate) fn decode_key<K: StoreKey>(store: &'static str, bytes: &[u8]) -> Result<K, StoreError> {
    K::decode(bytes).map_err(|reason| StoreError::CorruptKey { store, reason })
}

/// Returns the smallest byte string strictly greater than every string prefixed by `prefix`,
/// or `None` if the prefix is all `0xff`.
pub(crate) fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.last_mut() {
        if *last < 0xff {
            *last += 1;
            return Some(end);
        }
        end.pop();
    }
    None
}

// IMPLEMENTATIONS
// ================================================================================================

impl StoreKey for u8 {
    const ENCODED_LEN: usize = 1;

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }

    fn decode(bytes: &[u8]) -> Result<Self, String> {
        match bytes {
            [byte] => Ok(*byte),
            _ => Err(format!("expected 1 byte, got {}", bytes.len())),
        }
    }
}

impl StoreKey for u32 {
    const ENCODED_LEN: usize = 4;

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }

    fn decode(bytes: &[u8]) -> Result<Self, String> {
        let bytes: [u8; 4] =
            bytes.try_into().map_err(|_| format!("expected 4 bytes, got {}", bytes.len()))?;
        Ok(u32::from_be_bytes(bytes))
    }
}

impl StoreKey for u64 {
    const ENCODED_LEN: usize = 8;

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }

    fn decode(bytes: &[u8]) -> Result<Self, String> {
        let bytes: [u8; 8] =
            bytes.try_into().map_err(|_| format!("expected 8 bytes, got {}", bytes.len()))?;
        Ok(u64::from_be_bytes(bytes))
    }
}

impl StoreKey for [u8; 32] {
    const ENCODED_LEN: usize = 32;

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }

    fn decode(bytes: &[u8]) -> Result<Self, String> {
        bytes.try_into().map_err(|_| format!("expected 32 bytes, got {}", bytes.len()))
    }
}

impl<A: StoreKey, B: StoreKey> StoreKey for (A, B) {
    const ENCODED_LEN: usize = A::ENCODED_LEN + B::ENCODED_LEN;

    fn encode_into(&self, out: &mut Vec<u8>) {
        self.0.encode_into(out);
        self.1.encode_into(out);
    }

    fn decode(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(format!("expected {} bytes, got {}", Self::ENCODED_LEN, bytes.len()));
        }
        let (a, b) = bytes.split_at(A::ENCODED_LEN);
        Ok((A::decode(a)?, B::decode(b)?))
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::{StoreKey, prefix_successor};

    #[test]
    fn integer_keys_sort_numerically() {
        assert!(1u32.encode() < 2u32.encode());
        assert!(255u32.encode() < 256u32.encode());
        assert!(65_535u64.encode() < 65_536u64.encode());
    }

    #[test]
    fn composite_keys_sort_by_leading_component() {
        let a = (1u8, 500u32).encode();
        let b = (2u8, 0u32).encode();
        assert!(a < b);
    }

    #[test]
    fn composite_round_trip() {
        let key = (7u8, 1_000_000u32);
        let decoded = <(u8, u32)>::decode(&key.encode()).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn decode_rejects_wrong_width() {
        assert!(u32::decode(&[0, 0, 0]).is_err());
        assert!(<(u8, u32)>::decode(&[0; 6]).is_err());
    }

    #[test]
    fn prefix_successor_bounds_the_prefix() {
        assert_eq!(prefix_successor(&[1, 2]), Some(vec![1, 3]));
        assert_eq!(prefix_successor(&[1, 0xff]), Some(vec![2]));
        assert_eq!(prefix_successor(&[0xff, 0xff]), None);
    }
}
