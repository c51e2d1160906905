use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use xxhash_rust::xxh3;

/// Hashing seam for index keys. The containers only ever see 32 bits of the
/// result (the table truncates), so any well-distributed 64-bit hash works.
pub trait KeyHasher<K> {
    fn get_hash(&self, key: &K) -> u64;
}

/// Default key hasher backed by xxh3.
pub struct HashFunction<K> {
    _marker: PhantomData<K>,
}

impl<K> HashFunction<K> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<K> Default for HashFunction<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash> KeyHasher<K> for HashFunction<K> {
    fn get_hash(&self, key: &K) -> u64 {
        let mut hasher = xxh3::Xxh3::new();
        key.hash(&mut hasher);
        hasher.finish()
    }
}
