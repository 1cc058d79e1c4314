//! FastPFOR composites
//!
//! Whole 256-value blocks go through patched frame-of-reference, the
//! remainder through variable byte. The scalar and SIMD block kernels write
//! the same format, so either variant decodes the other's output.

use fastpfor::{AnyLenCodec, CompositeCodec, FastPForBlock256, FastPForSimdBlock256, VariableByte};

use super::{CodecError, CodecResult, IntegerCodec, Progress};

macro_rules! impl_fastpfor_composite {
    ($name:ident, $block:ty, $label:literal) => {
        pub struct $name {
            inner: CompositeCodec<$block, VariableByte>,
        }

        impl IntegerCodec for $name {
            fn new() -> Self {
                Self {
                    inner: CompositeCodec::default(),
                }
            }

            fn name(&self) -> &'static str {
                $label
            }

            #[inline]
            fn compress(&mut self, input: &[u32], output: &mut Vec<u32>) -> CodecResult<Progress> {
                let start = output.len();
                self.inner
                    .encode(input, output)
                    .map_err(|e| CodecError::fastpfor($label, e))?;
                Ok(Progress {
                    consumed: input.len(),
                    produced: output.len() - start,
                })
            }

            #[inline]
            fn decompress(&mut self, input: &[u32], output: &mut Vec<u32>) -> CodecResult<Progress> {
                let start = output.len();
                self.inner
                    .decode(input, output, None)
                    .map_err(|e| CodecError::fastpfor($label, e))?;
                Ok(Progress {
                    consumed: input.len(),
                    produced: output.len() - start,
                })
            }
        }
    };
}

impl_fastpfor_composite!(ScalarFastPfor, FastPForBlock256, "FastPFOR+VariableByte");
impl_fastpfor_composite!(VectorFastPfor, FastPForSimdBlock256, "VectorFastPFOR+VariableByte");
