use crate::storage::index::codec::Codec;

/// A generic fixed-width key holding opaque data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GenericKey<const N: usize> {
    /// The fixed-size array holding the key data.
    data: [u8; N],
}

impl<const N: usize> GenericKey<N> {
    /// Creates a new `GenericKey` with zeroed data.
    pub fn new() -> Self {
        Self { data: [0; N] }
    }

    /// Sets the key data from a slice of bytes; longer input is truncated,
    /// shorter input leaves the tail zeroed.
    pub fn set_from_bytes(&mut self, bytes: &[u8]) {
        let len = bytes.len().min(N);
        self.data[..len].copy_from_slice(&bytes[..len]);
    }

    /// Returns a reference to the key's byte data.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl<const N: usize> Default for GenericKey<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Codec for GenericKey<N> {
    const SIZE: usize = N;

    fn encode(&self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.data);
    }

    fn decode(buf: &[u8]) -> Self {
        let mut key = Self::new();
        key.data.copy_from_slice(buf);
        key
    }
}
