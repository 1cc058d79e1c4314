//! Synthetic input blocks
//!
//! Both generators are pure functions of their arguments. The compression
//! trial regenerates its block from scratch, and the decompression trial in
//! another process compares against the persisted copy of the same block.

use super::java_random::JavaRandom;
use crate::core_types::{BLOCK_SIZE, BitWidth};

/// Exclusive upper bound of uniform values at `bit_width`.
///
/// Widths of 30 and 31 draw from `2^(bits-3)` to stay clear of the
/// generator's sign bit while still needing 27/28 bits per value.
pub fn value_bound(bit_width: BitWidth) -> i32 {
    let bits = bit_width.bits();
    if bits < 30 { 1 << bits } else { 1 << (bits - 3) }
}

/// A 256-value block drawn uniformly from `[0, value_bound(bit_width))`.
pub fn generate(seed: i64, bit_width: BitWidth) -> Vec<i32> {
    let bound = value_bound(bit_width);
    let mut rng = JavaRandom::new(seed);
    (0..BLOCK_SIZE).map(|_| rng.next_int(bound)).collect()
}

/// Low-entropy stream with sparse outliers, shaped like inverted-index gaps.
///
/// Every value is 3, every 5th is 100 and every 533rd is 10000 (index 0
/// included). The pattern is fixed; `_seed` only keeps the signature in
/// line with [`generate`].
pub fn generate_skewed(_seed: i64, len: usize) -> Vec<i32> {
    let mut data = vec![3; len];
    for k in (0..len).step_by(5) {
        data[k] = 100;
    }
    for k in (0..len).step_by(533) {
        data[k] = 10000;
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{DEFAULT_SEED, SKEWED_LEN};

    fn bw(bits: u8) -> BitWidth {
        BitWidth::new(bits).unwrap()
    }

    #[test]
    fn test_value_bound() {
        assert_eq!(value_bound(bw(1)), 2);
        assert_eq!(value_bound(bw(29)), 1 << 29);
        assert_eq!(value_bound(bw(30)), 1 << 27);
        assert_eq!(value_bound(bw(31)), 1 << 28);
    }

    #[test]
    fn test_generate_is_deterministic() {
        for width in BitWidth::all() {
            assert_eq!(generate(DEFAULT_SEED, width), generate(DEFAULT_SEED, width));
        }
        assert_ne!(generate(1, bw(16)), generate(2, bw(16)));
    }

    #[test]
    fn test_generate_stays_in_domain() {
        for width in BitWidth::all() {
            let block = generate(DEFAULT_SEED, width);
            assert_eq!(block.len(), BLOCK_SIZE);
            let bound = value_bound(width);
            assert!(block.iter().all(|&v| (0..bound).contains(&v)));
        }
    }

    /// First values of `new Random(123456789)` drawing `nextInt(2)` and
    /// `nextInt(256)`.
    #[test]
    fn test_generate_matches_reference_suite() {
        let ones = generate(DEFAULT_SEED, bw(1));
        assert_eq!(&ones[..16], &[1, 1, 0, 0, 0, 0, 1, 0, 1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(ones.iter().sum::<i32>(), 117);

        let bytes = generate(DEFAULT_SEED, bw(8));
        assert_eq!(&bytes[..8], &[169, 195, 116, 65, 99, 55, 228, 108]);
    }

    #[test]
    fn test_skewed_pattern() {
        let data = generate_skewed(DEFAULT_SEED, SKEWED_LEN);
        assert_eq!(data.len(), SKEWED_LEN);
        assert_eq!(data[0], 10000);
        assert_eq!(data[1], 3);
        assert_eq!(data[5], 100);
        assert_eq!(data[533], 10000);
        assert_eq!(data[535], 100);
        assert_eq!(data[534], 3);
        assert_eq!(data, generate_skewed(7, SKEWED_LEN));
    }
}
