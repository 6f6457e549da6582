//! A chain harness for tests: an on-disk chain with trivial difficulty and deterministic
//! block construction.

use std::sync::Arc;

use ironfish_protocol::block::{Block, BlockHeader, Graffiti};
use ironfish_protocol::consensus::ConsensusParameters;
use ironfish_protocol::crypto;
use ironfish_protocol::hash::Nullifier;
use ironfish_protocol::make_genesis_block;
use ironfish_protocol::pow::PowHasher;
use ironfish_protocol::target::Target;
use ironfish_protocol::testing::{
    MockMinersFeeFactory,
    MockProofVerifier,
    output_with_seed,
    spend_with_nullifier,
    transaction_paying,
};
use ironfish_protocol::transaction::Transaction;
use tempfile::TempDir;

use crate::blockchain::{AddBlockResult, Blockchain};

/// Consensus parameters with trivial difficulty, for instant mining in tests.
pub fn test_params() -> ConsensusParameters {
    ConsensusParameters {
        min_difficulty: 1,
        genesis_supply_in_iron: 100,
        ..ConsensusParameters::default()
    }
}

/// An on-disk chain with helpers to build and ingest valid blocks.
///
/// Two harnesses built from the same parameters share a genesis block, so one node's blocks can
/// be fed to another to exercise forks and reorgs.
pub struct TestHarness {
    _dir: TempDir,
    pub chain: Blockchain,
    params: ConsensusParameters,
    seed: u64,
}

impl TestHarness {
    /// Creates a harness with its genesis block connected.
    pub fn new() -> Self {
        Self::with_node_id(0)
    }

    /// Creates a harness whose generated transactions differ from other node ids, so two
    /// harnesses produce distinct chains on top of the shared genesis.
    pub fn with_node_id(node_id: u64) -> Self {
        crypto::initialize();
        let params = test_params();
        let dir = tempfile::tempdir().expect("create tempdir");
        let mut chain = Blockchain::open(
            dir.path().join("chain.redb"),
            params.clone(),
            Arc::new(MockProofVerifier::default()),
            Arc::new(MockMinersFeeFactory),
        )
        .expect("open chain");

        let genesis = make_genesis_block(&params).expect("genesis");
        assert!(matches!(
            chain.add_block(&genesis).expect("add genesis"),
            AddBlockResult::Added
        ));

        Self { _dir: dir, chain, params, seed: node_id << 32 }
    }

    /// Returns a fresh deterministic seed.
    pub fn next_seed(&mut self) -> u64 {
        self.seed += 1;
        self.seed
    }

    /// Returns a fee-paying transaction with no spends.
    pub fn paying_tx(&mut self, fee: i64) -> Transaction {
        let seed = self.next_seed();
        transaction_paying(fee, 0, seed)
    }

    /// Returns a fee-paying transaction with no spends and the given expiration.
    pub fn expiring_tx(&mut self, fee: i64, expiration_sequence: u32) -> Transaction {
        let seed = self.next_seed();
        transaction_paying(fee, expiration_sequence, seed)
    }

    /// Returns a transaction spending against the current note tree root with a fresh
    /// deterministic nullifier.
    pub fn spending_tx(&mut self, fee: i64) -> Transaction {
        let seed = self.next_seed();
        let mut nullifier = [0u8; 32];
        nullifier[..8].copy_from_slice(&seed.to_be_bytes());
        self.spending_tx_with_nullifier(Nullifier::new(nullifier), fee)
    }

    /// Returns a transaction revealing `nullifier`, spending against the current note root.
    pub fn spending_tx_with_nullifier(&mut self, nullifier: Nullifier, fee: i64) -> Transaction {
        let commitment = self.chain.note_commitment().expect("note commitment");
        let seed = self.next_seed();
        Transaction::new(
            1,
            vec![spend_with_nullifier(nullifier, commitment.root, commitment.size)],
            vec![output_with_seed(seed)],
            Vec::new(),
            Vec::new(),
            fee,
            0,
            [7u8; 32],
            [0u8; 64],
        )
    }

    /// Builds a valid block on the current head carrying `transactions`, without ingesting it.
    ///
    /// A miner's fee balancing the transaction fees is prepended; when no fee-paying
    /// transaction is given, one is generated so the miner's fee stays negative.
    pub fn build_next(&mut self, mut transactions: Vec<Transaction>) -> Block {
        let head = self.chain.head_header().expect("head header");

        if transactions.iter().map(Transaction::fee).sum::<i64>() <= 0 {
            let filler = self.paying_tx(1);
            transactions.insert(0, filler);
        }
        let fees: i64 = transactions.iter().map(Transaction::fee).sum();

        let sequence = head.sequence() + 1;
        // The miner's fee output is seeded per harness so competing forks never share it.
        let miners_fee = Transaction::new(
            1,
            Vec::new(),
            vec![output_with_seed(self.next_seed())],
            Vec::new(),
            Vec::new(),
            -fees,
            0,
            [3u8; 32],
            [0u8; 64],
        );
        let mut block_transactions = vec![miners_fee];
        block_transactions.extend(transactions);

        let (note, nullifier) = self
            .chain
            .preview_commitments(&block_transactions)
            .expect("preview commitments");

        let timestamp_ms =
            head.timestamp_ms() + self.params.target_block_time_in_seconds * 1000;
        let target =
            Target::calculate(head.target(), head.timestamp_ms(), timestamp_ms, &self.params);
        let pow = PowHasher::for_sequence(&self.params, sequence);

        let mut randomness = 0u64;
        loop {
            let header = BlockHeader::new(
                sequence,
                head.hash(),
                note,
                nullifier,
                target,
                randomness,
                timestamp_ms,
                Graffiti::from_str_lossy("test block"),
                -fees,
            );
            if target.meets(&header.pow_hash(pow)) {
                return Block::new(header, block_transactions);
            }
            randomness += 1;
        }
    }

    /// Builds a block on the head and ingests it, asserting it became the new head.
    pub fn mine_next(&mut self, transactions: Vec<Transaction>) -> Block {
        let block = self.build_next(transactions);
        assert!(matches!(
            self.chain.add_block(&block).expect("add block"),
            AddBlockResult::Added
        ));
        block
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
