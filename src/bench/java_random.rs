//! Java-compatible Linear Congruential Generator (LCG) PRNG
//!
//! A bit-exact replica of `java.util.Random`, so blocks generated here are
//! identical to the ones the reference codec benchmarks feed their codecs.
//!
//! # Algorithm
//!
//! LCG formula: `seed = (seed * 0x5DEECE66D + 0xB) & ((1 << 48) - 1)`
//!
//! # Example
//!
//! ```rust
//! use intcodec_bench::bench::java_random::JavaRandom;
//!
//! let mut rng = JavaRandom::new(123456789);
//! let value = rng.next_int(1 << 8);
//! assert!((0..256).contains(&value));
//! ```

/// Java-compatible Linear Congruential Generator
#[derive(Debug, Clone)]
pub struct JavaRandom {
    seed: u64,
}

impl JavaRandom {
    /// LCG multiplier (0x5DEECE66DL in Java)
    const MULTIPLIER: u64 = 0x5DEECE66D;

    /// LCG addend (0xBL in Java)
    const ADDEND: u64 = 0xB;

    /// Mask for 48-bit state
    const MASK: u64 = (1 << 48) - 1;

    /// Create a new JavaRandom with the given seed.
    ///
    /// The seed is scrambled with the multiplier as the Java constructor does.
    pub fn new(seed: i64) -> Self {
        Self {
            seed: (seed as u64 ^ Self::MULTIPLIER) & Self::MASK,
        }
    }

    /// Generate the next `bits` random bits, as Java's `next(int bits)`.
    fn next(&mut self, bits: u32) -> i32 {
        self.seed = self
            .seed
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::ADDEND)
            & Self::MASK;
        (self.seed >> (48 - bits)) as i32
    }

    /// Generate a random int in range [0, bound), as Java's `nextInt(int bound)`.
    ///
    /// # Panics
    /// If `bound` is not positive.
    pub fn next_int(&mut self, bound: i32) -> i32 {
        assert!(bound > 0, "bound must be positive");
        let bound = bound as u32;

        // Fast path for powers of two
        if (bound & bound.wrapping_sub(1)) == 0 {
            return ((bound as u64 * self.next(31) as u64) >> 31) as i32;
        }

        // Rejection sampling: Java retries while `bits - val + (bound - 1)`
        // overflows a signed int.
        loop {
            let bits = self.next(31) as u32;
            let val = bits % bound;
            if bits - val + (bound - 1) < (1 << 31) {
                return val as i32;
            }
        }
    }
}
