use serde::{Deserialize, Serialize};

// ACTIVATION SEQUENCE
// ================================================================================================

/// The block sequence at which a consensus rule change activates, or never.
///
/// A rule is active for a block when the block's sequence is greater than or equal to the
/// activation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ActivationSequence(Option<u32>);

impl ActivationSequence {
    /// A rule that never activates.
    pub const NEVER: ActivationSequence = ActivationSequence(None);

    /// Returns a rule activating at the provided sequence.
    pub const fn at(sequence: u32) -> Self {
        Self(Some(sequence))
    }

    /// Returns true if the rule is active for a block at `sequence`.
    pub fn is_active(&self, sequence: u32) -> bool {
        match self.0 {
            Some(activation) => sequence >= activation,
            None => false,
        }
    }
}

// CONSENSUS PARAMETERS
// ================================================================================================

/// The consensus parameters of a network.
///
/// These are read from configuration at node start and never change at runtime; sequence-gated
/// rule changes are expressed as [`ActivationSequence`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusParameters {
    /// Seconds a block timestamp may sit in the future relative to local time.
    pub allowed_block_future_seconds: u64,
    /// Coins created by the genesis block, in whole iron.
    pub genesis_supply_in_iron: u64,
    /// Seconds the difficulty adjustment aims to keep between consecutive blocks.
    pub target_block_time_in_seconds: u64,
    /// Width of a difficulty adjustment bucket, in seconds.
    pub target_bucket_time_in_seconds: u64,
    /// Maximum serialized size of a block, in bytes.
    pub max_block_size_bytes: u64,
    /// Minimum fee of a non-miner transaction, in base units.
    pub min_fee: i64,
    /// Smallest difficulty retargeting may reach.
    pub min_difficulty: u64,
    /// How many leaves behind the current note tree a spend's root may be.
    pub max_spend_root_age: u32,
    /// Activation of asset ownership transfer semantics.
    pub enable_asset_ownership: ActivationSequence,
    /// Activation of the strictly-increasing block timestamp rule.
    pub enforce_sequential_block_time: ActivationSequence,
    /// Activation of the upgraded proof-of-work hash function.
    pub enable_fish_hash: ActivationSequence,
    /// Timestamp of the genesis block, in milliseconds since UNIX epoch.
    pub genesis_timestamp_ms: u64,
}

impl Default for ConsensusParameters {
    fn default() -> Self {
        Self {
            allowed_block_future_seconds: 15,
            genesis_supply_in_iron: 42_000_000,
            target_block_time_in_seconds: 60,
            target_bucket_time_in_seconds: 10,
            max_block_size_bytes: 2_000_000,
            min_fee: 1,
            min_difficulty: 131_072,
            max_spend_root_age: 10_000,
            enable_asset_ownership: ActivationSequence::NEVER,
            enforce_sequential_block_time: ActivationSequence::NEVER,
            enable_fish_hash: ActivationSequence::NEVER,
            genesis_timestamp_ms: 1_671_148_800_000,
        }
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::ActivationSequence;

    #[test]
    fn never_is_inactive_everywhere() {
        assert!(!ActivationSequence::NEVER.is_active(0));
        assert!(!ActivationSequence::NEVER.is_active(u32::MAX));
    }

    #[test]
    fn activation_is_inclusive() {
        let activation = ActivationSequence::at(10);
        assert!(!activation.is_active(9));
        assert!(activation.is_active(10));
        assert!(activation.is_active(11));
    }
}
