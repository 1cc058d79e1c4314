//! Core types used throughout the harness
//!
//! Block-size constants and the small enums that name a benchmark cell.
//! Their `Display` forms are the tokens used in artifact names and on the
//! driver command line, so they must stay stable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::HarnessError;

/// Element count of a bit-packing benchmark block.
pub const BLOCK_SIZE: usize = 256;

/// Element count handled by one scalar pack call.
pub const LANE_SIZE: usize = 32;

/// Element count of the skewed frame-of-reference stream.
pub const SKEWED_LEN: usize = 1_310_720;

/// Seed used by the reference suite for uniform blocks.
pub const DEFAULT_SEED: i64 = 123_456_789;

/// Bit width parameter of the bit-packing benchmarks.
///
/// # Constraints:
/// - **Range**: 1..=31, checked at construction
/// - **Compressed size**: a 256-element block packs into `8 * bits` words
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct BitWidth(u8);

impl BitWidth {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 31;

    pub fn new(bits: u8) -> Result<Self, HarnessError> {
        if (Self::MIN..=Self::MAX).contains(&bits) {
            Ok(Self(bits))
        } else {
            Err(HarnessError::InvalidBitWidth(bits))
        }
    }

    /// Every width the bit-packing sweep covers, ascending.
    pub fn all() -> impl Iterator<Item = BitWidth> {
        (Self::MIN..=Self::MAX).map(BitWidth)
    }

    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Words produced by packing `len` elements at this width.
    #[inline]
    pub fn packed_words(self, len: usize) -> usize {
        len / LANE_SIZE * self.0 as usize
    }
}

impl TryFrom<u8> for BitWidth {
    type Error = HarnessError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        BitWidth::new(bits)
    }
}

impl From<BitWidth> for u8 {
    fn from(bw: BitWidth) -> u8 {
        bw.0
    }
}

impl fmt::Display for BitWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Benchmark family. Selects block shape and codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    /// Fixed-width bit-packing of a 256-element block, swept over bit widths.
    #[serde(rename = "bitpackingbench")]
    BitPacking,
    /// Patched frame-of-reference composed with variable byte, skewed stream.
    #[serde(rename = "intcompressionbench")]
    IntCompression,
}

/// Codec implementation under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Scalar lane-at-a-time packing.
    Default,
    /// SIMD packing over the whole block.
    Vector,
}

/// Which half of the round trip a cell measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Compress,
    Decompress,
}

/// Pipeline stage of a persisted artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Original,
    Compressed,
}

macro_rules! impl_token {
    ($ty:ident { $($variant:ident => $token:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $token),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = HarnessError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($token => Ok($ty::$variant),)+
                    other => Err(HarnessError::UnknownToken {
                        kind: stringify!($ty),
                        token: other.to_string(),
                    }),
                }
            }
        }
    };
}

impl_token!(Family { BitPacking => "bitpackingbench", IntCompression => "intcompressionbench" });
impl_token!(Variant { Default => "default", Vector => "vector" });
impl_token!(Phase { Compress => "compress", Decompress => "decompress" });
impl_token!(Stage { Original => "original", Compressed => "compressed" });

impl Family {
    pub const ALL: [Family; 2] = [Family::BitPacking, Family::IntCompression];

    /// Whether cells of this family are parameterized by bit width.
    pub fn takes_bit_width(self) -> bool {
        matches!(self, Family::BitPacking)
    }
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::Default, Variant::Vector];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_width_range() {
        assert!(BitWidth::new(0).is_err());
        assert!(BitWidth::new(32).is_err());
        assert_eq!(BitWidth::new(1).unwrap().bits(), 1);
        assert_eq!(BitWidth::new(31).unwrap().bits(), 31);
        assert_eq!(BitWidth::all().count(), 31);
    }

    #[test]
    fn test_packed_words() {
        for bw in BitWidth::all() {
            assert_eq!(bw.packed_words(BLOCK_SIZE), 8 * bw.bits() as usize);
        }
    }

    #[test]
    fn test_tokens_round_trip() {
        for family in Family::ALL {
            assert_eq!(family.as_str().parse::<Family>().unwrap(), family);
        }
        for variant in Variant::ALL {
            assert_eq!(variant.to_string().parse::<Variant>().unwrap(), variant);
        }
        assert_eq!("decompress".parse::<Phase>().unwrap(), Phase::Decompress);
        assert!("scalar".parse::<Variant>().is_err());
    }

    #[test]
    fn test_serde_tokens_match_display() {
        let json = serde_json::to_string(&Family::IntCompression).unwrap();
        assert_eq!(json, "\"intcompressionbench\"");
        let bw: BitWidth = serde_json::from_str("7").unwrap();
        assert_eq!(bw.bits(), 7);
        assert!(serde_json::from_str::<BitWidth>("40").is_err());
    }
}
