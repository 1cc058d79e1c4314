//! Fixed-width block packers
//!
//! Thin adapters over the `bitpacking` crate that speak in `i32` words, the
//! unit every buffer in the harness uses. A pack call consumes exactly
//! `BLOCK_LEN` values and writes `BLOCK_LEN * bits / 32` words.

use bitpacking::{BitPacker, BitPacker1x, BitPacker8x};

/// Pack/unpack primitive over one fixed-size block of values.
///
/// Offsets are expressed by slicing: callers pass `&src[offset..]` and
/// `&mut dst[offset..]` and advance by the returned count.
pub trait BlockPacker {
    /// Values consumed by one `pack` call.
    const BLOCK_LEN: usize;

    /// Short name used in logs.
    const NAME: &'static str;

    fn new() -> Self;

    /// Words one block occupies at `bits` bits per value.
    #[inline]
    fn packed_words(bits: u8) -> usize {
        Self::BLOCK_LEN * bits as usize / 32
    }

    /// Packs `src[..BLOCK_LEN]` into `dst`, returning the words written.
    ///
    /// # Panics
    /// If `src` is shorter than `BLOCK_LEN` or `dst` shorter than
    /// `packed_words(bits)`. Values must already fit in `bits` bits.
    fn pack(&self, src: &[i32], dst: &mut [i32], bits: u8) -> usize;

    /// Unpacks one block from `src` into `dst[..BLOCK_LEN]`, returning the
    /// words read.
    ///
    /// # Panics
    /// If `src` is shorter than `packed_words(bits)` or `dst` shorter than
    /// `BLOCK_LEN`.
    fn unpack(&self, src: &[i32], dst: &mut [i32], bits: u8) -> usize;
}

macro_rules! impl_block_packer {
    ($name:ident, $inner:ty, $label:literal) => {
        #[derive(Clone, Copy)]
        pub struct $name {
            inner: $inner,
        }

        impl BlockPacker for $name {
            const BLOCK_LEN: usize = <$inner>::BLOCK_LEN;
            const NAME: &'static str = $label;

            fn new() -> Self {
                Self {
                    inner: <$inner>::new(),
                }
            }

            #[inline]
            fn pack(&self, src: &[i32], dst: &mut [i32], bits: u8) -> usize {
                let words = Self::packed_words(bits);
                let values: &[u32] = bytemuck::cast_slice(&src[..Self::BLOCK_LEN]);
                let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut dst[..words]);
                let written = self.inner.compress(values, bytes, bits);
                debug_assert_eq!(written, words * 4);
                words
            }

            #[inline]
            fn unpack(&self, src: &[i32], dst: &mut [i32], bits: u8) -> usize {
                let words = Self::packed_words(bits);
                let bytes: &[u8] = bytemuck::cast_slice(&src[..words]);
                let values: &mut [u32] = bytemuck::cast_slice_mut(&mut dst[..Self::BLOCK_LEN]);
                let read = self.inner.decompress(bytes, values, bits);
                debug_assert_eq!(read, words * 4);
                words
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($label)
            }
        }
    };
}

// 32 values per call, portable scalar code.
impl_block_packer!(ScalarPacker, BitPacker1x, "scalar");
// 256 values per call, AVX2 when available with a scalar fallback.
impl_block_packer!(VectorPacker, BitPacker8x, "vector");

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn round_trip<P: BlockPacker>(bits: u8, seed: u64) {
        let packer = P::new();
        let mut rng = StdRng::seed_from_u64(seed);
        let bound = if bits == 32 { u32::MAX } else { (1u32 << bits) - 1 };
        let src: Vec<i32> = (0..P::BLOCK_LEN)
            .map(|_| rng.gen_range(0..=bound) as i32)
            .collect();

        let mut packed = vec![0i32; P::packed_words(bits)];
        assert_eq!(packer.pack(&src, &mut packed, bits), packed.len());

        let mut out = vec![0i32; P::BLOCK_LEN];
        assert_eq!(packer.unpack(&packed, &mut out, bits), packed.len());
        assert_eq!(src, out, "{} round trip at {} bits", P::NAME, bits);
    }

    #[test]
    fn test_scalar_round_trip_all_widths() {
        for bits in 1..=32 {
            round_trip::<ScalarPacker>(bits, bits as u64);
        }
    }

    #[test]
    fn test_vector_round_trip_all_widths() {
        for bits in 1..=32 {
            round_trip::<VectorPacker>(bits, 100 + bits as u64);
        }
    }

    #[test]
    fn test_block_lengths() {
        assert_eq!(ScalarPacker::BLOCK_LEN, 32);
        assert_eq!(VectorPacker::BLOCK_LEN, 256);
        assert_eq!(ScalarPacker::packed_words(5), 5);
        assert_eq!(VectorPacker::packed_words(5), 40);
    }
}
