use crate::common::config::PageId;
use crate::common::rid::RID;

/// Fixed-width in-page encoding for index keys and values. Multi-byte
/// integers are stored in host byte order; the on-disk format is not meant to
/// be portable across architectures.
pub trait Codec: Sized {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Writes the value into `buf`, which is exactly [`Self::SIZE`] bytes.
    fn encode(&self, buf: &mut [u8]);

    /// Reads a value back out of `buf`, which is exactly [`Self::SIZE`] bytes.
    fn decode(buf: &[u8]) -> Self;
}

macro_rules! impl_codec_for_int {
    ($($t:ty),*) => {
        $(
            impl Codec for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                fn encode(&self, buf: &mut [u8]) {
                    buf.copy_from_slice(&self.to_ne_bytes());
                }

                fn decode(buf: &[u8]) -> Self {
                    <$t>::from_ne_bytes(buf.try_into().unwrap())
                }
            }
        )*
    };
}

impl_codec_for_int!(i32, u32, i64, u64);

impl Codec for RID {
    const SIZE: usize = 8;

    fn encode(&self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.get_page_id().to_ne_bytes());
        buf[4..8].copy_from_slice(&self.get_slot_num().to_ne_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        let page_id = PageId::from_ne_bytes(buf[..4].try_into().unwrap());
        let slot_num = u32::from_ne_bytes(buf[4..8].try_into().unwrap());
        RID::new(page_id, slot_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_round_trip() {
        let mut buf = [0u8; 4];
        (-7i32).encode(&mut buf);
        assert_eq!(i32::decode(&buf), -7);
    }

    #[test]
    fn rid_round_trip() {
        let rid = RID::new(123, 45);
        let mut buf = [0u8; RID::SIZE];
        rid.encode(&mut buf);
        assert_eq!(RID::decode(&buf), rid);
    }
}
