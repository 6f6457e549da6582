use std::sync::Arc;

use ironfish_protocol::block::{Block, BlockHeader};
use ironfish_protocol::consensus::ConsensusParameters;
use ironfish_protocol::pow::PowHasher;
use ironfish_protocol::proof::ProofVerifier;
use ironfish_protocol::target::Target;
use ironfish_protocol::transaction::Transaction;

use crate::errors::{BurnReason, MintReason, ValidationError};

// VERIFIER
// ================================================================================================

/// Context-free verification of transactions and blocks.
///
/// Everything here is a pure function of the verified bytes and the consensus parameters;
/// checks that need chain state (spend roots, nullifier uniqueness, asset registry, tree
/// commitments, retargeting) run inside the blockchain engine while a block is applied.
pub struct Verifier {
    params: ConsensusParameters,
    proofs: Arc<dyn ProofVerifier>,
}

impl Verifier {
    /// Creates a verifier over the given parameters and proof boundary.
    pub fn new(params: ConsensusParameters, proofs: Arc<dyn ProofVerifier>) -> Self {
        Self { params, proofs }
    }

    /// Returns the consensus parameters this verifier runs under.
    pub fn params(&self) -> &ConsensusParameters {
        &self.params
    }

    // TRANSACTION TIER
    // --------------------------------------------------------------------------------------------

    /// Verifies everything about a transaction that does not require chain state.
    pub fn verify_transaction(&self, transaction: &Transaction) -> Result<(), ValidationError> {
        if transaction.fee() < 0 && !transaction.is_miners_fee() {
            return Err(ValidationError::NegativeFee);
        }
        if !transaction.is_miners_fee() && transaction.fee() < self.params.min_fee {
            return Err(ValidationError::FeeTooLow {
                fee: transaction.fee(),
                min: self.params.min_fee,
            });
        }

        for mint in transaction.mints() {
            if mint.value == 0 {
                return Err(ValidationError::InvalidMint(MintReason::ZeroValue));
            }
        }
        for burn in transaction.burns() {
            if burn.value == 0 {
                return Err(ValidationError::InvalidBurn(BurnReason::ZeroValue));
            }
            if burn.asset_id.is_native() {
                return Err(ValidationError::InvalidBurn(BurnReason::NativeAsset));
            }
        }

        for spend in transaction.spends() {
            self.proofs.verify_spend(spend)?;
        }
        for output in transaction.outputs() {
            self.proofs.verify_output(output)?;
        }
        for mint in transaction.mints() {
            self.proofs.verify_mint(mint)?;
        }
        self.proofs.verify_binding(transaction)?;

        Ok(())
    }

    // BLOCK TIER
    // --------------------------------------------------------------------------------------------

    /// Verifies everything about a block that does not require chain state.
    ///
    /// `now_ms` is the local clock, used only for the future-timestamp bound.
    pub fn verify_block(&self, block: &Block, now_ms: u64) -> Result<(), ValidationError> {
        let header = block.header();

        let size = block.serialized_size() as u64;
        if size > self.params.max_block_size_bytes {
            return Err(ValidationError::BlockTooLarge {
                size,
                max: self.params.max_block_size_bytes,
            });
        }

        let horizon_ms = now_ms + self.params.allowed_block_future_seconds * 1000;
        if header.timestamp_ms() > horizon_ms {
            return Err(ValidationError::TimestampTooFar {
                timestamp_ms: header.timestamp_ms(),
                allowed_seconds: self.params.allowed_block_future_seconds,
            });
        }

        let pow = PowHasher::for_sequence(&self.params, header.sequence());
        if !header.target().meets(&header.pow_hash(pow)) {
            return Err(ValidationError::InvalidPow);
        }

        self.verify_miners_fee(block)?;

        for transaction in block.transactions() {
            self.verify_transaction(transaction)?;
            if !transaction.is_miners_fee() && transaction.is_expired_at(header.sequence()) {
                return Err(ValidationError::TransactionExpired {
                    expiration: transaction.expiration_sequence(),
                    sequence: header.sequence(),
                });
            }
        }

        Ok(())
    }

    /// Verifies a header against its parent: sequence, retarget and the sequential-timestamp
    /// rule when it is active.
    pub fn verify_header_against_parent(
        &self,
        header: &BlockHeader,
        parent: &BlockHeader,
    ) -> Result<(), ValidationError> {
        if header.sequence() != parent.sequence() + 1 {
            return Err(ValidationError::InvalidSequence {
                sequence: header.sequence(),
                parent_sequence: parent.sequence(),
            });
        }

        let expected = Target::calculate(
            parent.target(),
            parent.timestamp_ms(),
            header.timestamp_ms(),
            &self.params,
        );
        if header.target() != expected {
            return Err(ValidationError::InvalidTarget { expected });
        }

        if self.params.enforce_sequential_block_time.is_active(header.sequence())
            && header.timestamp_ms() <= parent.timestamp_ms()
        {
            return Err(ValidationError::TimestampNotSequential {
                timestamp_ms: header.timestamp_ms(),
                parent_timestamp_ms: parent.timestamp_ms(),
            });
        }

        Ok(())
    }

    fn verify_miners_fee(&self, block: &Block) -> Result<(), ValidationError> {
        let header = block.header();

        let Some(first) = block.transactions().first() else {
            return Err(ValidationError::MissingMinersFee);
        };
        if !first.is_miners_fee() {
            return Err(ValidationError::MissingMinersFee);
        }
        if block.transactions().iter().skip(1).any(|tx| tx.fee() < 0) {
            return Err(ValidationError::MissingMinersFee);
        }
        if header.miners_fee() != first.fee() {
            return Err(ValidationError::InvalidMinersFee {
                actual: header.miners_fee(),
                expected: first.fee(),
            });
        }

        // Genesis premines the supply; its fee does not balance against other transactions.
        if header.is_genesis() {
            return Ok(());
        }

        let fees: i64 = block.transactions().iter().skip(1).map(Transaction::fee).sum();
        if header.miners_fee() != -fees {
            return Err(ValidationError::InvalidMinersFee {
                actual: header.miners_fee(),
                expected: -fees,
            });
        }

        Ok(())
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use ironfish_protocol::consensus::ConsensusParameters;
    use ironfish_protocol::crypto;
    use ironfish_protocol::testing::{
        MockProofVerifier,
        miners_fee_transaction,
        transaction_with_fee,
    };

    use super::Verifier;
    use crate::errors::ValidationError;

    fn verifier(params: ConsensusParameters) -> Verifier {
        crypto::initialize();
        Verifier::new(params, Arc::new(MockProofVerifier::default()))
    }

    #[test]
    fn accepts_an_ordinary_transaction() {
        let verifier = verifier(ConsensusParameters::default());
        verifier.verify_transaction(&transaction_with_fee(5, 0)).unwrap();
    }

    #[test]
    fn rejects_fee_below_minimum() {
        let params = ConsensusParameters { min_fee: 10, ..ConsensusParameters::default() };
        let verifier = verifier(params);
        assert_matches!(
            verifier.verify_transaction(&transaction_with_fee(5, 0)).unwrap_err(),
            ValidationError::FeeTooLow { fee: 5, min: 10 }
        );
    }

    #[test]
    fn rejects_negative_fee_outside_miners_fee_shape() {
        let verifier = verifier(ConsensusParameters::default());
        assert_matches!(
            verifier.verify_transaction(&transaction_with_fee(-5, 0)).unwrap_err(),
            ValidationError::NegativeFee
        );
    }

    #[test]
    fn accepts_a_miners_fee_below_minimum() {
        let params = ConsensusParameters { min_fee: 10, ..ConsensusParameters::default() };
        let verifier = verifier(params);
        verifier.verify_transaction(&miners_fee_transaction(-100, 1)).unwrap();
    }

    #[test]
    fn rejects_failing_proofs() {
        crypto::initialize();
        let verifier = Verifier::new(
            ConsensusParameters::default(),
            Arc::new(MockProofVerifier { reject: true }),
        );
        assert_matches!(
            verifier.verify_transaction(&transaction_with_fee(5, 0)).unwrap_err(),
            ValidationError::InvalidProof(_)
        );
    }
}
