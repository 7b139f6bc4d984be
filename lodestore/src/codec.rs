use crate::errors::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{Debug, Display, Formatter};
use std::marker::PhantomData;

/// An immutable byte-sequence key.
///
/// Keys carry an explicit length (they are not nul-terminated) and order
/// byte-wise lexicographically — the same ordering the engine applies on
/// disk, which the enumerator relies on for seek and bound semantics.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(Vec<u8>);

impl Key {
    /// Returns the raw key bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the key length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for the empty key.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if this key begins with the given prefix.
    #[inline]
    pub fn starts_with(&self, prefix: &Key) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Consumes the key, returning the underlying bytes.
    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Key {
    fn from(bytes: Vec<u8>) -> Self {
        Key(bytes)
    }
}

impl From<&[u8]> for Key {
    fn from(bytes: &[u8]) -> Self {
        Key(bytes.to_vec())
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key(s.as_bytes().to_vec())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key(s.into_bytes())
    }
}

impl Display for Key {
    /// Renders UTF-8 keys as text, anything else as lowercase hex.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => {
                for byte in &self.0 {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

impl Debug for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Key({})", self)
    }
}

/// Pluggable value codec for a store.
///
/// `encode` must be deterministic for a given key/value pair and `decode`
/// must invert any bytes `encode` produced for the same key. Decode failure
/// on corrupt or foreign bytes must surface as an error — never a silently
/// substituted default value.
///
/// The key is passed to both halves so codecs may vary the wire format per
/// key family (e.g. a compact encoding for counters under one prefix).
pub trait Codec: Send + Sync + 'static {
    /// The application-level value type this codec produces and consumes.
    type Value: Send + Sync + 'static;

    /// Serializes a value into the bytes stored under `key`.
    fn encode(&self, key: &Key, value: &Self::Value) -> StoreResult<Vec<u8>>;

    /// Deserializes the bytes stored under `key` back into a value.
    fn decode(&self, key: &Key, bytes: &[u8]) -> StoreResult<Self::Value>;
}

/// Default serde-based codec using bincode's legacy configuration.
///
/// Used when a store needs no custom wire format: any `Serialize +
/// DeserializeOwned` value round-trips through it. The key does not
/// influence the encoding.
pub struct BincodeCodec<V> {
    _marker: PhantomData<fn() -> V>,
}

impl<V> BincodeCodec<V> {
    /// Creates the default codec.
    #[inline]
    pub fn new() -> BincodeCodec<V> {
        BincodeCodec {
            _marker: PhantomData,
        }
    }
}

impl<V> Default for BincodeCodec<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for BincodeCodec<V> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<V> Codec for BincodeCodec<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    type Value = V;

    fn encode(&self, key: &Key, value: &V) -> StoreResult<Vec<u8>> {
        bincode::serde::encode_to_vec(value, bincode::config::legacy()).map_err(|e| {
            StoreError::Encode {
                key: key.clone(),
                details: e.to_string(),
            }
        })
    }

    fn decode(&self, key: &Key, bytes: &[u8]) -> StoreResult<V> {
        bincode::serde::decode_from_slice(bytes, bincode::config::legacy())
            .map(|(value, _)| value)
            .map_err(|e| StoreError::Decode {
                key: key.clone(),
                details: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ordering_is_bytewise() {
        let a = Key::from("a");
        let ab = Key::from("ab");
        let b = Key::from("b");
        assert!(a < ab);
        assert!(ab < b);
    }

    #[test]
    fn test_key_starts_with() {
        let key = Key::from("user:42");
        assert!(key.starts_with(&Key::from("user:")));
        assert!(!key.starts_with(&Key::from("admin:")));
        // every key shares the empty prefix
        assert!(key.starts_with(&Key::default()));
    }

    #[test]
    fn test_key_display_utf8_and_binary() {
        assert_eq!(Key::from("hello").to_string(), "hello");
        assert_eq!(Key::from(vec![0xff, 0x00]).to_string(), "ff00");
    }

    #[test]
    fn test_key_from_conversions() {
        let from_str = Key::from("k");
        let from_string = Key::from("k".to_string());
        let from_slice = Key::from("k".as_bytes());
        let from_vec = Key::from(b"k".to_vec());
        assert_eq!(from_str, from_string);
        assert_eq!(from_str, from_slice);
        assert_eq!(from_str, from_vec);
    }

    #[test]
    fn test_bincode_codec_round_trip() {
        let codec = BincodeCodec::<String>::new();
        let key = Key::from("greeting");
        let encoded = codec.encode(&key, &"hello".to_string()).unwrap();
        let decoded = codec.decode(&key, &encoded).unwrap();
        assert_eq!(decoded, "hello");
    }

    #[test]
    fn test_bincode_codec_decode_failure_is_error() {
        let codec = BincodeCodec::<String>::new();
        let key = Key::from("k");
        // a length prefix pointing far past the end of the buffer
        let result = codec.decode(&key, &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 1]);
        match result {
            Err(StoreError::Decode { key: k, .. }) => assert_eq!(k, key),
            other => panic!("expected decode error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_bincode_codec_struct_round_trip() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Person {
            name: String,
            age: u32,
        }

        let codec = BincodeCodec::<Person>::new();
        let key = Key::from("person:1");
        let person = Person {
            name: "Ada".to_string(),
            age: 36,
        };
        let encoded = codec.encode(&key, &person).unwrap();
        assert_eq!(codec.decode(&key, &encoded).unwrap(), person);
    }
}
