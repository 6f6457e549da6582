use std::collections::VecDeque;

use ironfish_protocol::block::Block;
use ironfish_protocol::transaction::Transaction;
use serde::{Deserialize, Serialize};
use tracing::trace;

// CONFIG
// ================================================================================================

/// Configuration of the sliding-window fee estimator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeEstimatorConfig {
    /// Number of recent blocks the window covers.
    pub num_blocks: usize,
    /// Lowest-fee transactions sampled per block.
    pub num_samples_per_block: usize,
    /// Fee suggested before the window has enough samples.
    pub default_fee: i64,
}

impl Default for FeeEstimatorConfig {
    fn default() -> Self {
        Self { num_blocks: 10, num_samples_per_block: 3, default_fee: 1 }
    }
}

// FEE ESTIMATOR
// ================================================================================================

/// Suggests fees from the lowest fees of recently connected blocks.
///
/// Each connected block contributes its lowest non-miner fees to a bounded FIFO window; head
/// advances push the oldest samples out. Suggestions interpolate between adjacent samples, so
/// they are monotone in the requested percentile.
pub struct FeeEstimator {
    config: FeeEstimatorConfig,
    window: VecDeque<i64>,
}

impl FeeEstimator {
    /// Creates an estimator with an empty window.
    pub fn new(config: FeeEstimatorConfig) -> Self {
        Self { config, window: VecDeque::new() }
    }

    /// Returns the number of fee samples currently in the window.
    pub fn sample_count(&self) -> usize {
        self.window.len()
    }

    /// Feeds the fees of a newly connected block into the window.
    pub fn on_connect_block(&mut self, block: &Block) {
        let mut fees: Vec<i64> = block
            .transactions()
            .iter()
            .filter(|tx| !tx.is_miners_fee())
            .map(Transaction::fee)
            .collect();
        fees.sort_unstable();

        for fee in fees.into_iter().take(self.config.num_samples_per_block) {
            self.window.push_back(fee);
        }

        let capacity = self.config.num_blocks * self.config.num_samples_per_block;
        while self.window.len() > capacity {
            self.window.pop_front();
        }
        trace!(samples = self.window.len(), "fee window advanced");
    }

    /// Suggests a fee at the given percentile of the window, in base units.
    ///
    /// Returns the configured default until the window holds at least one sample per covered
    /// block. Percentiles above 100 are clamped.
    pub fn suggested_fee(&self, percentile: u8) -> i64 {
        if self.window.len() < self.config.num_blocks {
            return self.config.default_fee;
        }

        let mut samples: Vec<i64> = self.window.iter().copied().collect();
        samples.sort_unstable();

        let percentile = percentile.min(100) as i64;
        let position = percentile * (samples.len() as i64 - 1);
        let index = (position / 100) as usize;
        let fraction = position % 100;

        let base = samples[index];
        match samples.get(index + 1) {
            Some(next) if fraction > 0 => base + (next - base) * fraction / 100,
            _ => base,
        }
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use ironfish_chain::testing::TestHarness;
    use rstest::rstest;

    use super::{FeeEstimator, FeeEstimatorConfig};

    fn estimator_with_window(fees_per_block: &[&[i64]]) -> FeeEstimator {
        let config = FeeEstimatorConfig {
            num_blocks: 3,
            num_samples_per_block: 2,
            default_fee: 7,
        };
        let mut estimator = FeeEstimator::new(config);
        let mut harness = TestHarness::new();
        for fees in fees_per_block {
            let transactions = fees.iter().map(|fee| harness.paying_tx(*fee)).collect();
            let block = harness.mine_next(transactions);
            estimator.on_connect_block(&block);
        }
        estimator
    }

    #[test]
    fn median_interpolates_between_samples() {
        // Window 3 blocks x 2 samples; lowest fees {10,20},{30,40},{50,60}.
        let estimator = estimator_with_window(&[&[20, 10], &[40, 30], &[60, 50]]);
        assert_eq!(estimator.sample_count(), 6);
        assert_eq!(estimator.suggested_fee(50), 35);
        assert_eq!(estimator.suggested_fee(0), 10);
        assert_eq!(estimator.suggested_fee(100), 60);
    }

    #[test]
    fn default_until_window_fills() {
        let estimator = estimator_with_window(&[&[100, 200]]);
        assert_eq!(estimator.suggested_fee(50), 7);
    }

    #[test]
    fn only_lowest_fees_are_sampled() {
        // Three fees per block but only two samples kept: the highest is ignored.
        let estimator = estimator_with_window(&[&[10, 20, 900], &[30, 40, 900], &[50, 60, 900]]);
        assert_eq!(estimator.suggested_fee(100), 60);
    }

    #[test]
    fn window_slides_as_blocks_connect() {
        let estimator =
            estimator_with_window(&[&[1, 2], &[10, 20], &[30, 40], &[50, 60]]);
        // The first block's samples fell out of the 3-block window.
        assert_eq!(estimator.suggested_fee(0), 10);
    }

    #[rstest]
    #[case(0, 25)]
    #[case(10, 25)]
    #[case(40, 60)]
    #[case(90, 95)]
    #[case(100, 100)]
    fn percentiles_are_monotone(#[case] low: u8, #[case] high: u8) {
        let estimator = estimator_with_window(&[&[25, 30], &[45, 60], &[80, 100]]);
        assert!(estimator.suggested_fee(low) <= estimator.suggested_fee(high));
    }
}
