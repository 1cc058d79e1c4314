//! Integer codecs driven by the benchmark harness
//!
//! - [`packer`] - fixed-width block packers (scalar and SIMD)
//! - [`composite`] - FastPFOR blocks with a variable byte tail
//!
//! Both are thin adapters over the `bitpacking` and `fastpfor` crates.
//! Codecs report how much they read and wrote as a [`Progress`] value.

pub mod composite;
mod error;
pub mod packer;

pub use composite::{ScalarFastPfor, VectorFastPfor};
pub use error::{CodecError, CodecResult};
pub use packer::{BlockPacker, ScalarPacker, VectorPacker};

/// Elements read and words written (or the reverse, when decompressing).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Input words or values consumed from the front of the input.
    pub consumed: usize,
    /// Words or values appended to the output.
    pub produced: usize,
}

/// Variable-length integer codec over 32-bit words.
pub trait IntegerCodec {
    fn new() -> Self;

    fn name(&self) -> &'static str;

    /// Compresses all of `input`, appending the encoded words to `output`.
    fn compress(&mut self, input: &[u32], output: &mut Vec<u32>) -> CodecResult<Progress>;

    /// Inverse of [`compress`](IntegerCodec::compress). `consumed` counts
    /// compressed words, `produced` counts restored values.
    fn decompress(&mut self, input: &[u32], output: &mut Vec<u32>) -> CodecResult<Progress>;
}
