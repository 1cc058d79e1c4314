//! Trial fixtures
//!
//! A [`Fixture`] is the per-trial state of one benchmark cell: it owns the
//! input and output buffers and the codec, and walks a fixed lifecycle.
//!
//! ```text
//! Created --setup--> Ready --invoke--> Invoked --invoke--> ...
//!                      |                  |
//!                      +----teardown------+--> Destroyed
//! ```
//!
//! Setup and teardown run exactly once per trial, outside the measured
//! region. A failed setup leaves the fixture in `Created` with its buffers
//! untouched, and teardown from `Created` is refused, so a trial that never
//! loaded its input can never report a verdict.

use serde::{Deserialize, Serialize};

use super::artifact::{ArtifactName, ArtifactStore};
use super::data_gen;
use super::matrix::Cell;
use super::oracle::{CorrectnessOracle, Verdict};
use crate::codec::{
    BlockPacker, IntegerCodec, ScalarFastPfor, ScalarPacker, VectorFastPfor, VectorPacker,
};
use crate::core_types::{BLOCK_SIZE, BitWidth, Family, Phase, SKEWED_LEN, Stage, Variant};
use crate::error::{HarnessError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixtureState {
    Created,
    Ready,
    Invoked,
    Destroyed,
}

/// The cell-specific half of a fixture: buffers, codec and the measured
/// operation.
pub trait Workload {
    /// Fills the buffers. Must not modify them when returning an error.
    fn setup(&mut self, store: &dyn ArtifactStore) -> Result<()>;

    /// The measured operation.
    fn run(&mut self) -> Result<()>;

    /// Persists artifacts and/or checks the result. Decompression workloads
    /// return their verdict.
    fn teardown(
        &mut self,
        cell: &str,
        store: &mut dyn ArtifactStore,
        oracle: &CorrectnessOracle,
    ) -> Result<Option<Verdict>>;

    /// Current contents of the output buffer.
    fn output(&self) -> &[i32];
}

pub struct Fixture<W> {
    cell: Cell,
    state: FixtureState,
    workload: W,
}

impl<W: Workload> Fixture<W> {
    pub fn new(cell: Cell, workload: W) -> Self {
        Self {
            cell,
            state: FixtureState::Created,
            workload,
        }
    }

    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    pub fn state(&self) -> FixtureState {
        self.state
    }

    pub fn workload(&self) -> &W {
        &self.workload
    }

    pub fn setup(&mut self, store: &dyn ArtifactStore) -> Result<()> {
        if self.state != FixtureState::Created {
            return Err(self.refuse("set up"));
        }
        self.workload.setup(store)?;
        self.state = FixtureState::Ready;
        tracing::debug!(cell = %self.cell, "fixture ready");
        Ok(())
    }

    #[inline]
    pub fn invoke(&mut self) -> Result<()> {
        match self.state {
            FixtureState::Ready | FixtureState::Invoked => {
                self.workload.run()?;
                self.state = FixtureState::Invoked;
                Ok(())
            }
            _ => Err(self.refuse("invoke")),
        }
    }

    /// Ends the trial. The fixture is `Destroyed` afterwards even if
    /// persisting or verifying failed.
    pub fn teardown(
        &mut self,
        store: &mut dyn ArtifactStore,
        oracle: &CorrectnessOracle,
    ) -> Result<Option<Verdict>> {
        match self.state {
            FixtureState::Ready | FixtureState::Invoked => {
                self.state = FixtureState::Destroyed;
                let label = self.cell.to_string();
                let verdict = self.workload.teardown(&label, store, oracle)?;
                tracing::debug!(cell = %label, ?verdict, "fixture torn down");
                Ok(verdict)
            }
            _ => Err(self.refuse("tear down")),
        }
    }

    fn refuse(&self, action: &'static str) -> HarnessError {
        HarnessError::InvalidTransition {
            action,
            state: self.state,
        }
    }
}

/// Receives the concrete fixture for a cell.
///
/// Lets callers run a monomorphized measurement loop without boxing the
/// workload.
pub trait FixtureVisitor {
    type Output;

    fn visit<W: Workload>(self, fixture: Fixture<W>) -> Self::Output;
}

/// Builds the fixture for `cell` and hands it to `visitor`.
///
/// Both phases of a cell derive their artifact names from the same
/// (family, variant), which is how a decompression trial finds what the
/// compression trial stored.
pub fn build<V: FixtureVisitor>(cell: &Cell, seed: i64, visitor: V) -> Result<V::Output> {
    match cell.variant {
        Variant::Default => build_with::<ScalarPacker, ScalarFastPfor, V>(cell, seed, visitor),
        Variant::Vector => build_with::<VectorPacker, VectorFastPfor, V>(cell, seed, visitor),
    }
}

fn build_with<P, C, V>(cell: &Cell, seed: i64, visitor: V) -> Result<V::Output>
where
    P: BlockPacker,
    C: IntegerCodec,
    V: FixtureVisitor,
{
    let original = ArtifactName::new(cell.family, cell.variant, Stage::Original);
    let compressed = ArtifactName::new(cell.family, cell.variant, Stage::Compressed);
    let output = match (cell.family, cell.phase) {
        (Family::BitPacking, Phase::Compress) => {
            let workload = PackCompress::<P>::new(original, compressed, cell.require_bit_width()?, seed);
            visitor.visit(Fixture::new(*cell, workload))
        }
        (Family::BitPacking, Phase::Decompress) => {
            let workload = PackDecompress::<P>::new(original, compressed, cell.require_bit_width()?);
            visitor.visit(Fixture::new(*cell, workload))
        }
        (Family::IntCompression, Phase::Compress) => {
            let workload = PforCompress::<C>::new(original, compressed, seed);
            visitor.visit(Fixture::new(*cell, workload))
        }
        (Family::IntCompression, Phase::Decompress) => {
            let workload = PforDecompress::<C>::new(original, compressed);
            visitor.visit(Fixture::new(*cell, workload))
        }
    };
    Ok(output)
}

// ============================================================
// Bit-packing workloads
// ============================================================

/// Packs a uniform 256-value block lane by lane.
pub struct PackCompress<P> {
    original: ArtifactName,
    compressed: ArtifactName,
    bit_width: BitWidth,
    seed: i64,
    packer: P,
    input: Vec<i32>,
    output: Vec<i32>,
    produced: usize,
}

impl<P: BlockPacker> PackCompress<P> {
    pub fn new(original: ArtifactName, compressed: ArtifactName, bit_width: BitWidth, seed: i64) -> Self {
        Self {
            original,
            compressed,
            bit_width,
            seed,
            packer: P::new(),
            input: Vec::new(),
            output: Vec::new(),
            produced: 0,
        }
    }

    pub fn input(&self) -> &[i32] {
        &self.input
    }
}

impl<P: BlockPacker> Workload for PackCompress<P> {
    fn setup(&mut self, _store: &dyn ArtifactStore) -> Result<()> {
        self.input = data_gen::generate(self.seed, self.bit_width);
        self.output = vec![0; self.bit_width.packed_words(BLOCK_SIZE)];
        Ok(())
    }

    #[inline]
    fn run(&mut self) -> Result<()> {
        let bits = self.bit_width.bits();
        let mut out = 0;
        for lane in self.input.chunks_exact(P::BLOCK_LEN) {
            out += self.packer.pack(lane, &mut self.output[out..], bits);
        }
        self.produced = out;
        std::hint::black_box(&mut self.output);
        Ok(())
    }

    fn teardown(
        &mut self,
        _cell: &str,
        store: &mut dyn ArtifactStore,
        _oracle: &CorrectnessOracle,
    ) -> Result<Option<Verdict>> {
        store.store(&self.original, &self.input)?;
        store.store(&self.compressed, &self.output[..self.produced])?;
        Ok(None)
    }

    fn output(&self) -> &[i32] {
        &self.output
    }
}

/// Unpacks the stored block lane by lane.
pub struct PackDecompress<P> {
    original: ArtifactName,
    compressed: ArtifactName,
    bit_width: BitWidth,
    packer: P,
    input: Vec<i32>,
    output: Vec<i32>,
}

impl<P: BlockPacker> PackDecompress<P> {
    pub fn new(original: ArtifactName, compressed: ArtifactName, bit_width: BitWidth) -> Self {
        Self {
            original,
            compressed,
            bit_width,
            packer: P::new(),
            input: Vec::new(),
            output: Vec::new(),
        }
    }
}

impl<P: BlockPacker> Workload for PackDecompress<P> {
    fn setup(&mut self, store: &dyn ArtifactStore) -> Result<()> {
        let compressed = store.load(&self.compressed)?;
        let expected = self.bit_width.packed_words(BLOCK_SIZE);
        if compressed.len() != expected {
            return Err(HarnessError::StaleArtifact {
                name: self.compressed.file_name(),
                expected,
                found: compressed.len(),
            });
        }
        self.input = compressed;
        self.output = vec![0; BLOCK_SIZE];
        Ok(())
    }

    #[inline]
    fn run(&mut self) -> Result<()> {
        let bits = self.bit_width.bits();
        let mut src = 0;
        for lane in self.output.chunks_exact_mut(P::BLOCK_LEN) {
            src += self.packer.unpack(&self.input[src..], lane, bits);
        }
        std::hint::black_box(&mut self.output);
        Ok(())
    }

    fn teardown(
        &mut self,
        cell: &str,
        store: &mut dyn ArtifactStore,
        oracle: &CorrectnessOracle,
    ) -> Result<Option<Verdict>> {
        let original = store.load(&self.original)?;
        oracle.verify(cell, &original, &self.output).map(Some)
    }

    fn output(&self) -> &[i32] {
        &self.output
    }
}

// ============================================================
// Frame-of-reference workloads
// ============================================================

/// Compresses the skewed stream with one composite codec call.
pub struct PforCompress<C> {
    original: ArtifactName,
    compressed: ArtifactName,
    seed: i64,
    codec: C,
    data: Vec<i32>,
    output: Vec<u32>,
    produced: usize,
}

impl<C: IntegerCodec> PforCompress<C> {
    pub fn new(original: ArtifactName, compressed: ArtifactName, seed: i64) -> Self {
        Self {
            original,
            compressed,
            seed,
            codec: C::new(),
            data: Vec::new(),
            output: Vec::new(),
            produced: 0,
        }
    }

    pub fn produced(&self) -> usize {
        self.produced
    }
}

impl<C: IntegerCodec> Workload for PforCompress<C> {
    fn setup(&mut self, _store: &dyn ArtifactStore) -> Result<()> {
        self.data = data_gen::generate_skewed(self.seed, SKEWED_LEN);
        self.output = Vec::with_capacity(SKEWED_LEN);
        Ok(())
    }

    #[inline]
    fn run(&mut self) -> Result<()> {
        self.output.clear();
        let progress = self
            .codec
            .compress(bytemuck::cast_slice(&self.data), &mut self.output)?;
        self.produced = progress.produced;
        Ok(())
    }

    fn teardown(
        &mut self,
        _cell: &str,
        store: &mut dyn ArtifactStore,
        _oracle: &CorrectnessOracle,
    ) -> Result<Option<Verdict>> {
        tracing::debug!(codec = self.codec.name(), words = self.produced, "stream compressed");
        store.store(&self.original, &self.data)?;
        store.store(&self.compressed, bytemuck::cast_slice(&self.output[..self.produced]))?;
        Ok(None)
    }

    fn output(&self) -> &[i32] {
        bytemuck::cast_slice(&self.output)
    }
}

/// Restores the skewed stream with one composite codec call.
pub struct PforDecompress<C> {
    original: ArtifactName,
    compressed: ArtifactName,
    codec: C,
    input: Vec<i32>,
    output: Vec<u32>,
}

impl<C: IntegerCodec> PforDecompress<C> {
    pub fn new(original: ArtifactName, compressed: ArtifactName) -> Self {
        Self {
            original,
            compressed,
            codec: C::new(),
            input: Vec::new(),
            output: Vec::new(),
        }
    }
}

impl<C: IntegerCodec> Workload for PforDecompress<C> {
    fn setup(&mut self, store: &dyn ArtifactStore) -> Result<()> {
        self.input = store.load(&self.compressed)?;
        self.output = Vec::with_capacity(SKEWED_LEN);
        Ok(())
    }

    #[inline]
    fn run(&mut self) -> Result<()> {
        self.output.clear();
        self.codec
            .decompress(bytemuck::cast_slice(&self.input), &mut self.output)?;
        Ok(())
    }

    fn teardown(
        &mut self,
        cell: &str,
        store: &mut dyn ArtifactStore,
        oracle: &CorrectnessOracle,
    ) -> Result<Option<Verdict>> {
        let original = store.load(&self.original)?;
        oracle.verify(cell, &original, bytemuck::cast_slice(&self.output)).map(Some)
    }

    fn output(&self) -> &[i32] {
        bytemuck::cast_slice(&self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::artifact::MemoryArtifactStore;
    use crate::bench::oracle::MismatchPolicy;
    use crate::core_types::DEFAULT_SEED;

    fn names(family: Family, variant: Variant) -> (ArtifactName, ArtifactName) {
        (
            ArtifactName::new(family, variant, Stage::Original),
            ArtifactName::new(family, variant, Stage::Compressed),
        )
    }

    fn bw(bits: u8) -> BitWidth {
        BitWidth::new(bits).unwrap()
    }

    fn pack_cell(variant: Variant, phase: Phase, bits: u8) -> Cell {
        Cell::new(Family::BitPacking, variant, phase, Some(bw(bits))).unwrap()
    }

    fn compress_bitpacking<P: BlockPacker>(
        variant: Variant,
        bits: u8,
        store: &mut MemoryArtifactStore,
    ) -> Vec<i32> {
        let (original, compressed) = names(Family::BitPacking, variant);
        let mut fixture = Fixture::new(
            pack_cell(variant, Phase::Compress, bits),
            PackCompress::<P>::new(original, compressed, bw(bits), DEFAULT_SEED),
        );
        fixture.setup(&*store).unwrap();
        for _ in 0..3 {
            fixture.invoke().unwrap();
        }
        let packed = fixture.workload().output().to_vec();
        let verdict = fixture.teardown(store, &CorrectnessOracle::default()).unwrap();
        assert_eq!(verdict, None);
        assert_eq!(fixture.state(), FixtureState::Destroyed);
        packed
    }

    fn decompress_bitpacking<P: BlockPacker>(
        variant: Variant,
        bits: u8,
        store: &mut MemoryArtifactStore,
    ) -> (Vec<i32>, Verdict) {
        let (original, compressed) = names(Family::BitPacking, variant);
        let mut fixture = Fixture::new(
            pack_cell(variant, Phase::Decompress, bits),
            PackDecompress::<P>::new(original, compressed, bw(bits)),
        );
        fixture.setup(&*store).unwrap();
        fixture.invoke().unwrap();
        let restored = fixture.workload().output().to_vec();
        let verdict = fixture
            .teardown(store, &CorrectnessOracle::default())
            .unwrap()
            .unwrap();
        (restored, verdict)
    }

    #[test]
    fn test_bitpacking_round_trip_every_width() {
        for bits in 1..=31 {
            let mut store = MemoryArtifactStore::new();
            let packed = compress_bitpacking::<ScalarPacker>(Variant::Default, bits, &mut store);
            assert_eq!(packed.len(), 8 * bits as usize);
            let (restored, verdict) =
                decompress_bitpacking::<ScalarPacker>(Variant::Default, bits, &mut store);
            assert!(verdict.is_match(), "scalar width {}", bits);
            assert_eq!(restored, data_gen::generate(DEFAULT_SEED, bw(bits)));

            let packed = compress_bitpacking::<VectorPacker>(Variant::Vector, bits, &mut store);
            assert_eq!(packed.len(), 8 * bits as usize);
            let (_, verdict) =
                decompress_bitpacking::<VectorPacker>(Variant::Vector, bits, &mut store);
            assert!(verdict.is_match(), "vector width {}", bits);
        }
    }

    #[test]
    fn test_width_one_scenario() {
        let mut store = MemoryArtifactStore::new();
        let packed = compress_bitpacking::<ScalarPacker>(Variant::Default, 1, &mut store);
        assert_eq!(packed.len(), 8);

        let (original, _) = names(Family::BitPacking, Variant::Default);
        let block = store.load(&original).unwrap();
        assert!(block.iter().all(|&v| v == 0 || v == 1));

        // one bit per value, lane order, least significant bit first
        for (lane, word) in packed.iter().enumerate() {
            for bit in 0..32 {
                assert_eq!((*word as u32 >> bit) & 1, block[lane * 32 + bit] as u32);
            }
        }

        let (restored, verdict) =
            decompress_bitpacking::<ScalarPacker>(Variant::Default, 1, &mut store);
        assert_eq!(verdict, Verdict::Match);
        assert_eq!(restored, block);
    }

    #[test]
    fn test_teardown_stores_produced_words_only() {
        let mut store = MemoryArtifactStore::new();
        let (original, compressed) = names(Family::IntCompression, Variant::Default);
        let cell = Cell::new(Family::IntCompression, Variant::Default, Phase::Compress, None).unwrap();
        let mut fixture = Fixture::new(
            cell,
            PforCompress::<ScalarFastPfor>::new(original, compressed, DEFAULT_SEED),
        );
        fixture.setup(&store).unwrap();
        fixture.invoke().unwrap();
        let produced = fixture.workload().produced();
        assert!(produced > 0 && produced < SKEWED_LEN);
        fixture.teardown(&mut store, &CorrectnessOracle::default()).unwrap();

        assert_eq!(store.load(&compressed).unwrap().len(), produced);
        assert_eq!(store.load(&original).unwrap().len(), SKEWED_LEN);
    }

    #[test]
    fn test_missing_artifact_keeps_fixture_created() {
        let store = MemoryArtifactStore::new();
        let (original, compressed) = names(Family::BitPacking, Variant::Vector);
        let mut fixture = Fixture::new(
            pack_cell(Variant::Vector, Phase::Decompress, 4),
            PackDecompress::<VectorPacker>::new(original, compressed, bw(4)),
        );

        let err = fixture.setup(&store).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(fixture.state(), FixtureState::Created);
        assert!(fixture.workload().output().is_empty());

        assert!(matches!(
            fixture.invoke(),
            Err(HarnessError::InvalidTransition { .. })
        ));
        let mut store = store;
        assert!(matches!(
            fixture.teardown(&mut store, &CorrectnessOracle::default()),
            Err(HarnessError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_stale_artifact_from_other_width() {
        let mut store = MemoryArtifactStore::new();
        compress_bitpacking::<ScalarPacker>(Variant::Default, 7, &mut store);

        let (original, compressed) = names(Family::BitPacking, Variant::Default);
        let mut fixture = Fixture::new(
            pack_cell(Variant::Default, Phase::Decompress, 9),
            PackDecompress::<ScalarPacker>::new(original, compressed, bw(9)),
        );
        match fixture.setup(&store) {
            Err(HarnessError::StaleArtifact { expected, found, .. }) => {
                assert_eq!(expected, 72);
                assert_eq!(found, 56);
            }
            other => panic!("expected stale artifact, got {:?}", other.err()),
        }
        assert_eq!(fixture.state(), FixtureState::Created);
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut store = MemoryArtifactStore::new();
        let (original, compressed) = names(Family::BitPacking, Variant::Default);
        let mut fixture = Fixture::new(
            pack_cell(Variant::Default, Phase::Compress, 3),
            PackCompress::<ScalarPacker>::new(original, compressed, bw(3), DEFAULT_SEED),
        );
        assert_eq!(fixture.state(), FixtureState::Created);
        fixture.setup(&store).unwrap();
        assert_eq!(fixture.state(), FixtureState::Ready);
        assert!(fixture.setup(&store).is_err());
        fixture.invoke().unwrap();
        assert_eq!(fixture.state(), FixtureState::Invoked);
        fixture.teardown(&mut store, &CorrectnessOracle::default()).unwrap();
        assert_eq!(fixture.state(), FixtureState::Destroyed);
        assert!(fixture.invoke().is_err());
        assert!(fixture.teardown(&mut store, &CorrectnessOracle::default()).is_err());
    }

    #[test]
    fn test_corrupted_original_is_reported_not_fatal() {
        let mut store = MemoryArtifactStore::new();
        compress_bitpacking::<ScalarPacker>(Variant::Default, 5, &mut store);
        let (original, _) = names(Family::BitPacking, Variant::Default);
        let mut block = store.load(&original).unwrap();
        block[17] ^= 1;
        store.store(&original, &block).unwrap();

        let (_, verdict) = decompress_bitpacking::<ScalarPacker>(Variant::Default, 5, &mut store);
        assert!(matches!(verdict, Verdict::Mismatch { first_index: 17, differing: 1, .. }));
    }

    #[test]
    fn test_fail_fast_turns_mismatch_into_error() {
        let mut store = MemoryArtifactStore::new();
        compress_bitpacking::<VectorPacker>(Variant::Vector, 12, &mut store);
        let (original, compressed) = names(Family::BitPacking, Variant::Vector);
        store.store(&original, &[0; BLOCK_SIZE]).unwrap();

        let mut fixture = Fixture::new(
            pack_cell(Variant::Vector, Phase::Decompress, 12),
            PackDecompress::<VectorPacker>::new(original, compressed, bw(12)),
        );
        fixture.setup(&store).unwrap();
        fixture.invoke().unwrap();
        let err = fixture
            .teardown(&mut store, &CorrectnessOracle::new(MismatchPolicy::FailFast))
            .unwrap_err();
        assert!(matches!(err, HarnessError::Mismatch { .. }));
        assert_eq!(fixture.state(), FixtureState::Destroyed);
    }

    struct RunOnce<'a> {
        store: &'a mut MemoryArtifactStore,
    }

    impl FixtureVisitor for RunOnce<'_> {
        type Output = Result<Option<Verdict>>;

        fn visit<W: Workload>(self, mut fixture: Fixture<W>) -> Self::Output {
            fixture.setup(&*self.store)?;
            fixture.invoke()?;
            fixture.teardown(&mut *self.store, &CorrectnessOracle::default())
        }
    }

    #[test]
    fn test_frame_of_reference_round_trip_both_variants() {
        let mut store = MemoryArtifactStore::new();
        for variant in Variant::ALL {
            for phase in [Phase::Compress, Phase::Decompress] {
                let cell = Cell::new(Family::IntCompression, variant, phase, None).unwrap();
                let verdict = build(&cell, DEFAULT_SEED, RunOnce { store: &mut store })
                    .unwrap()
                    .unwrap();
                match phase {
                    Phase::Compress => assert_eq!(verdict, None),
                    Phase::Decompress => assert_eq!(verdict, Some(Verdict::Match)),
                }
            }
        }
        // four distinct artifacts, no cross-variant overwrite
        for variant in Variant::ALL {
            for stage in [Stage::Original, Stage::Compressed] {
                assert!(store.contains(&ArtifactName::new(Family::IntCompression, variant, stage)));
            }
        }
    }
}
