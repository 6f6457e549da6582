use core::fmt::{self, Display};
use core::ops::Add;

use primitive_types::U256;
use winter_utils::{
    ByteReader,
    ByteWriter,
    Deserializable,
    DeserializationError,
    Serializable,
};

use crate::consensus::ConsensusParameters;

// TARGET
// ================================================================================================

/// The proof-of-work target of a block.
///
/// A block header satisfies its target when the 256-bit integer interpretation of its PoW hash is
/// less than or equal to the target. Smaller targets are harder to meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Target(U256);

impl Target {
    /// The largest (easiest) possible target.
    pub const MAX: Target = Target(U256::MAX);

    /// Returns a new target wrapping the provided 256-bit value.
    pub const fn new(value: U256) -> Self {
        Self(value)
    }

    /// Returns a target from its big-endian byte representation.
    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Self(U256::from_big_endian(&bytes))
    }

    /// Returns the big-endian byte representation of this target.
    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0.to_big_endian()
    }

    /// Returns the target corresponding to the given difficulty.
    ///
    /// Difficulty and target are reciprocal views of the same quantity; the conversion keeps
    /// `from_difficulty(to_difficulty(t))` stable for targets produced by retargeting.
    pub fn from_difficulty(difficulty: u64) -> Self {
        debug_assert!(difficulty > 0, "difficulty must be positive");
        Self(U256::MAX / U256::from(difficulty))
    }

    /// Returns the difficulty corresponding to this target.
    pub fn to_difficulty(&self) -> u64 {
        if self.0.is_zero() {
            return u64::MAX;
        }
        let difficulty = U256::MAX / self.0;
        if difficulty > U256::from(u64::MAX) {
            u64::MAX
        } else {
            difficulty.as_u64()
        }
    }

    /// Returns true if the provided PoW hash meets this target.
    pub fn meets(&self, pow_hash: &[u8; 32]) -> bool {
        U256::from_big_endian(pow_hash) <= self.0
    }

    /// Returns the expected work of a block mined against this target.
    ///
    /// Work is defined as `2^256 / (target + 1)`, computed without overflowing 256 bits as
    /// `(!target / (target + 1)) + 1`.
    pub fn work(&self) -> Work {
        let (denominator, overflow) = self.0.overflowing_add(U256::one());
        if overflow {
            // Target::MAX: every hash qualifies, one unit of work.
            return Work(U256::one());
        }
        Work((!self.0 / denominator) + U256::one())
    }

    /// Computes the target of a block at `timestamp_ms` following a parent mined against
    /// `parent_target` at `parent_timestamp_ms`.
    ///
    /// Difficulty moves in steps of `parent_difficulty / 2048`, scaled by how many whole time
    /// buckets elapsed since the parent: a fast block raises difficulty by one step, each full
    /// bucket beyond the target block time lowers it by one step, bounded at 99 steps down.
    pub fn calculate(
        parent_target: Target,
        parent_timestamp_ms: u64,
        timestamp_ms: u64,
        params: &ConsensusParameters,
    ) -> Target {
        let parent_difficulty = parent_target.to_difficulty();

        let elapsed_seconds = timestamp_ms.saturating_sub(parent_timestamp_ms) / 1000;
        let buckets =
            elapsed_seconds.saturating_sub(params.target_block_time_in_seconds)
                / params.target_bucket_time_in_seconds.max(1);
        let steps = if elapsed_seconds < params.target_block_time_in_seconds {
            1i64
        } else {
            -(buckets.min(99) as i64)
        };

        let step_size = (parent_difficulty / 2048).max(1);
        let difficulty = if steps >= 0 {
            parent_difficulty.saturating_add(step_size.saturating_mul(steps as u64))
        } else {
            parent_difficulty.saturating_sub(step_size.saturating_mul(steps.unsigned_abs()))
        };

        Target::from_difficulty(difficulty.max(params.min_difficulty))
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// SERIALIZATION
// ================================================================================================

impl Serializable for Target {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        target.write_bytes(&self.to_be_bytes());
    }
}

impl Deserializable for Target {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        Ok(Self::from_be_bytes(source.read_array::<32>()?))
    }
}

// WORK
// ================================================================================================

/// Accumulated proof-of-work, the quantity fork choice maximizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Work(U256);

impl Work {
    /// Zero accumulated work.
    pub const ZERO: Work = Work(U256::zero());

    /// Returns a new work value wrapping the provided 256-bit value.
    pub const fn new(value: U256) -> Self {
        Self(value)
    }

    /// Returns the big-endian byte representation of this work value.
    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0.to_big_endian()
    }

    /// Returns a work value from its big-endian byte representation.
    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Self(U256::from_big_endian(&bytes))
    }
}

impl Add for Work {
    type Output = Work;

    fn add(self, other: Work) -> Work {
        Work(self.0.saturating_add(other.0))
    }
}

impl Serializable for Work {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        target.write_bytes(&self.to_be_bytes());
    }
}

impl Deserializable for Work {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        Ok(Self::from_be_bytes(source.read_array::<32>()?))
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use primitive_types::U256;
    use rstest::rstest;

    use super::{Target, Work};
    use crate::consensus::ConsensusParameters;

    #[test]
    fn work_of_max_target_is_one() {
        assert_eq!(Target::MAX.work(), Work::new(U256::one()));
    }

    #[rstest]
    #[case(1_000, 1_000_000)]
    #[case(131_072, 131_073)]
    #[case(1, u32::MAX as u64)]
    fn work_is_monotone_in_difficulty(#[case] easy: u64, #[case] hard: u64) {
        assert!(Target::from_difficulty(hard).work() > Target::from_difficulty(easy).work());
    }

    #[test]
    fn half_range_target_doubles_work() {
        let half = Target::new(U256::MAX / 2);
        assert_eq!(half.work(), Work::new(U256::from(2u8)));
    }

    #[test]
    fn meets_compares_big_endian() {
        let target = Target::from_difficulty(2);
        let mut qualifying = [0u8; 32];
        qualifying[0] = 0x10;
        assert!(target.meets(&qualifying));
        assert!(!target.meets(&[0xff; 32]));
    }

    #[test]
    fn fast_block_raises_difficulty() {
        let params = ConsensusParameters::default();
        let parent = Target::from_difficulty(1 << 22);
        let next = Target::calculate(parent, 0, 1_000, &params);
        assert!(next.to_difficulty() > parent.to_difficulty());
    }

    #[test]
    fn slow_block_lowers_difficulty() {
        let params = ConsensusParameters::default();
        let parent = Target::from_difficulty(1 << 22);
        let slow_ms = (params.target_block_time_in_seconds
            + 5 * params.target_bucket_time_in_seconds)
            * 1000;
        let next = Target::calculate(parent, 0, slow_ms, &params);
        assert!(next.to_difficulty() < parent.to_difficulty());
    }

    #[test]
    fn difficulty_never_drops_below_minimum() {
        let params = ConsensusParameters::default();
        let parent = Target::from_difficulty(params.min_difficulty);
        let next = Target::calculate(parent, 0, u32::MAX as u64 * 1000, &params);
        assert_eq!(next.to_difficulty(), params.min_difficulty);
    }

    #[test]
    fn target_bytes_round_trip() {
        let target = Target::from_difficulty(123_456_789);
        assert_eq!(Target::from_be_bytes(target.to_be_bytes()), target);
    }
}
