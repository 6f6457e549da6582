use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use ironfish_chain::errors::ValidationError;
use ironfish_chain::{Blockchain, ChainError};
use ironfish_protocol::block::Block;
use ironfish_protocol::hash::{Nullifier, TransactionHash};
use ironfish_protocol::transaction::Transaction;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::priority_queue::PriorityQueue;

mod fee_estimator;
pub use fee_estimator::{FeeEstimator, FeeEstimatorConfig};

// CONFIG
// ================================================================================================

/// Configuration of the mempool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MempoolConfig {
    /// Total serialized bytes of pending transactions the pool holds before evicting by
    /// fee rate.
    pub max_size_bytes: usize,
    /// Hashes remembered after eviction, so re-announcements are rejected cheaply.
    pub recently_evicted_capacity: usize,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self { max_size_bytes: 60 * 1024 * 1024, recently_evicted_capacity: 1024 }
    }
}

// ACCEPTANCE
// ================================================================================================

/// Why the mempool refused a transaction.
#[derive(Debug, Error)]
pub enum RejectReason {
    #[error("transaction is already pending")]
    AlreadyInPool,
    #[error("transaction was recently evicted")]
    RecentlyEvicted,
    #[error("transaction failed verification")]
    Invalid(#[source] ValidationError),
    #[error("transaction expired at sequence {expiration}")]
    Expired { expiration: u32 },
    #[error("a pending or confirmed transaction already reveals this nullifier")]
    DuplicateNullifier(Nullifier),
    #[error("pool is full and the fee rate {fee_rate} does not beat the lowest pending {lowest}")]
    PoolFull { fee_rate: u64, lowest: u64 },
    #[error("miner's fee transactions are not relayed")]
    MinersFee,
}

/// The outcome of offering a transaction to the pool.
#[derive(Debug)]
pub enum AcceptResult {
    /// The transaction is now pending.
    Accepted,
    /// The transaction was refused; the pool is unchanged.
    Rejected(RejectReason),
}

/// Why a pending transaction left the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// The transaction was confirmed by a connected block.
    Confirmed,
    /// A connected block spent one of the transaction's nullifiers.
    DoubleSpent,
    /// The head passed the transaction's expiration sequence.
    Expired,
    /// The pool was full and the transaction had the lowest fee rate.
    FeeRateOutbid,
}

/// A transaction evicted by a head advance or capacity pressure.
#[derive(Debug)]
pub struct Eviction {
    pub hash: TransactionHash,
    pub reason: EvictionReason,
}

struct PoolEntry {
    transaction: Transaction,
    size: usize,
}

/// Fee per kilobyte of serialized transaction, the pool's eviction and template ordering key.
fn fee_rate(transaction: &Transaction, size: usize) -> u64 {
    let fee = transaction.fee().max(0) as u64;
    fee.saturating_mul(1024) / size.max(1) as u64
}

// MEMPOOL
// ================================================================================================

/// The set of accepted, unconfirmed transactions awaiting inclusion in a block.
///
/// The pool tracks pending transactions by hash, orders them by fee rate for eviction and for
/// block template assembly, indexes them by expiration sequence so head advances expire them,
/// and by nullifier so a double-spend against a pending transaction is refused on arrival.
/// Consistency with the chain is the caller's schedule: [`Mempool::on_connect_block`] and
/// [`Mempool::on_disconnect_block`] must be driven in the order the chain applies blocks.
pub struct Mempool {
    config: MempoolConfig,
    transactions: HashMap<TransactionHash, PoolEntry>,
    by_fee_rate: PriorityQueue<TransactionHash, (u64, TransactionHash), ()>,
    by_expiration: BTreeMap<u32, BTreeSet<TransactionHash>>,
    by_nullifier: HashMap<Nullifier, TransactionHash>,
    recently_evicted: RecentlyEvicted,
    size_bytes: usize,
}

impl Mempool {
    /// Creates an empty pool.
    pub fn new(config: MempoolConfig) -> Self {
        let recently_evicted = RecentlyEvicted::new(config.recently_evicted_capacity);
        Self {
            config,
            transactions: HashMap::new(),
            by_fee_rate: PriorityQueue::new(),
            by_expiration: BTreeMap::new(),
            by_nullifier: HashMap::new(),
            recently_evicted,
            size_bytes: 0,
        }
    }

    // PUBLIC ACCESSORS
    // --------------------------------------------------------------------------------------------

    /// Returns the number of pending transactions.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Returns true if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Returns the total serialized size of pending transactions, in bytes.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Returns true if a transaction with this hash is pending.
    pub fn contains(&self, hash: &TransactionHash) -> bool {
        self.transactions.contains_key(hash)
    }

    /// Returns the pending transaction with this hash, if any.
    pub fn get(&self, hash: &TransactionHash) -> Option<&Transaction> {
        self.transactions.get(hash).map(|entry| &entry.transaction)
    }

    // ACCEPTANCE
    // --------------------------------------------------------------------------------------------

    /// Offers a transaction to the pool.
    ///
    /// Runs context-free verification plus a snapshot check of nullifier uniqueness against the
    /// chain's current head. A full pool evicts pending transactions with lower fee rates to
    /// make room; a transaction that cannot beat the lowest pending fee rate is refused.
    pub fn accept(
        &mut self,
        transaction: Transaction,
        chain: &Blockchain,
    ) -> Result<AcceptResult, ChainError> {
        let hash = transaction.hash();

        if self.transactions.contains_key(&hash) {
            return Ok(AcceptResult::Rejected(RejectReason::AlreadyInPool));
        }
        if self.recently_evicted.contains(&hash) {
            return Ok(AcceptResult::Rejected(RejectReason::RecentlyEvicted));
        }
        if transaction.is_miners_fee() {
            return Ok(AcceptResult::Rejected(RejectReason::MinersFee));
        }

        // A pending transaction must still be includable in the next block.
        let next_sequence = chain.head_sequence() + 1;
        if transaction.is_expired_at(next_sequence) {
            return Ok(AcceptResult::Rejected(RejectReason::Expired {
                expiration: transaction.expiration_sequence(),
            }));
        }

        if let Err(err) = chain.verifier().verify_transaction(&transaction) {
            return Ok(AcceptResult::Rejected(RejectReason::Invalid(err)));
        }

        for spend in transaction.spends() {
            if chain.contains_nullifier(&spend.nullifier)? {
                return Ok(AcceptResult::Rejected(RejectReason::DuplicateNullifier(
                    spend.nullifier,
                )));
            }
            if self.by_nullifier.contains_key(&spend.nullifier) {
                return Ok(AcceptResult::Rejected(RejectReason::DuplicateNullifier(
                    spend.nullifier,
                )));
            }
        }

        let size = transaction.serialized_size();
        let rate = fee_rate(&transaction, size);

        // Make room by evicting cheaper transactions; refuse if the newcomer cannot win.
        while self.size_bytes + size > self.config.max_size_bytes {
            let Some((_, (lowest_rate, _), _)) = self.by_fee_rate.peek_min() else {
                break;
            };
            if *lowest_rate >= rate {
                return Ok(AcceptResult::Rejected(RejectReason::PoolFull {
                    fee_rate: rate,
                    lowest: *lowest_rate,
                }));
            }
            let (victim, _) = self.by_fee_rate.pop_min().expect("peeked entry exists");
            self.remove(&victim, EvictionReason::FeeRateOutbid);
        }

        self.insert(hash, transaction, size, rate);
        Ok(AcceptResult::Accepted)
    }

    // HEAD TRACKING
    // --------------------------------------------------------------------------------------------

    /// Reconciles the pool with a block that connected to the main chain.
    ///
    /// Drops confirmed transactions, anything double-spent by the block, and anything whose
    /// expiration the new head has passed. Feeds the block into `fees` for estimation.
    pub fn on_connect_block(
        &mut self,
        block: &Block,
        fees: &mut FeeEstimator,
    ) -> Vec<Eviction> {
        let mut evictions = Vec::new();

        for transaction in block.transactions() {
            let hash = transaction.hash();
            if self.transactions.contains_key(&hash) {
                self.remove(&hash, EvictionReason::Confirmed);
                evictions.push(Eviction { hash, reason: EvictionReason::Confirmed });
            }
            for spend in transaction.spends() {
                if let Some(pending) = self.by_nullifier.get(&spend.nullifier).copied()
                    && self.transactions.contains_key(&pending)
                {
                    self.remove(&pending, EvictionReason::DoubleSpent);
                    evictions.push(Eviction { hash: pending, reason: EvictionReason::DoubleSpent });
                }
            }
        }

        let head_sequence = block.header().sequence();
        let expired: Vec<TransactionHash> = self
            .by_expiration
            .range(1..=head_sequence)
            .flat_map(|(_, hashes)| hashes.iter().copied())
            .collect();
        for hash in expired {
            self.remove(&hash, EvictionReason::Expired);
            evictions.push(Eviction { hash, reason: EvictionReason::Expired });
        }

        fees.on_connect_block(block);
        debug!(
            evicted = evictions.len(),
            pending = self.transactions.len(),
            sequence = head_sequence,
            "mempool reconciled with connected block"
        );
        evictions
    }

    /// Returns the non-miner transactions of a disconnected block to the pool.
    ///
    /// Transactions that conflict with something already pending, or that expired in the
    /// meantime, stay out.
    pub fn on_disconnect_block(
        &mut self,
        block: &Block,
        chain: &Blockchain,
    ) -> Result<(), ChainError> {
        for transaction in block.transactions() {
            if transaction.is_miners_fee() {
                continue;
            }
            // Disconnected transactions were evicted as confirmed earlier; let them back in.
            self.recently_evicted.remove(&transaction.hash());
            match self.accept(transaction.clone(), chain)? {
                AcceptResult::Accepted => {},
                AcceptResult::Rejected(reason) => {
                    debug!(hash = %transaction.hash(), %reason, "disconnected transaction not re-queued");
                },
            }
        }
        Ok(())
    }

    // TEMPLATE ASSEMBLY
    // --------------------------------------------------------------------------------------------

    /// Returns pending transactions for a block template, greedily by descending fee rate,
    /// within the given size and count budgets.
    pub fn ordered_for_template(&self, max_bytes: usize, max_count: usize) -> Vec<Transaction> {
        let mut selected = Vec::new();
        let mut used_bytes = 0;

        for (hash, _) in self.by_fee_rate.iter_desc() {
            if selected.len() >= max_count {
                break;
            }
            let entry = &self.transactions[hash];
            if used_bytes + entry.size > max_bytes {
                continue;
            }
            used_bytes += entry.size;
            selected.push(entry.transaction.clone());
        }

        selected
    }

    // HELPERS
    // --------------------------------------------------------------------------------------------

    fn insert(&mut self, hash: TransactionHash, transaction: Transaction, size: usize, rate: u64) {
        for spend in transaction.spends() {
            self.by_nullifier.insert(spend.nullifier, hash);
        }
        if transaction.expiration_sequence() != 0 {
            self.by_expiration
                .entry(transaction.expiration_sequence())
                .or_default()
                .insert(hash);
        }
        self.by_fee_rate.insert(hash, (rate, hash), ());
        self.size_bytes += size;
        self.transactions.insert(hash, PoolEntry { transaction, size });
    }

    fn remove(&mut self, hash: &TransactionHash, reason: EvictionReason) {
        let Some(entry) = self.transactions.remove(hash) else {
            return;
        };

        for spend in entry.transaction.spends() {
            if self.by_nullifier.get(&spend.nullifier) == Some(hash) {
                self.by_nullifier.remove(&spend.nullifier);
            }
        }
        let expiration = entry.transaction.expiration_sequence();
        if expiration != 0
            && let Some(bucket) = self.by_expiration.get_mut(&expiration)
        {
            bucket.remove(hash);
            if bucket.is_empty() {
                self.by_expiration.remove(&expiration);
            }
        }
        self.by_fee_rate.remove(hash);
        self.size_bytes -= entry.size;

        // Confirmed transactions may legitimately return after a reorg; everything else is
        // remembered so re-announcements bounce.
        if reason != EvictionReason::Confirmed {
            self.recently_evicted.insert(*hash);
        }
        debug!(hash = %hash, ?reason, "transaction left the mempool");
    }
}

// RECENTLY EVICTED
// ================================================================================================

/// A bounded FIFO set of recently evicted transaction hashes.
struct RecentlyEvicted {
    order: VecDeque<TransactionHash>,
    set: std::collections::HashSet<TransactionHash>,
    capacity: usize,
}

impl RecentlyEvicted {
    fn new(capacity: usize) -> Self {
        Self { order: VecDeque::new(), set: std::collections::HashSet::new(), capacity }
    }

    fn contains(&self, hash: &TransactionHash) -> bool {
        self.set.contains(hash)
    }

    fn insert(&mut self, hash: TransactionHash) {
        if self.capacity == 0 || !self.set.insert(hash) {
            return;
        }
        self.order.push_back(hash);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }
    }

    fn remove(&mut self, hash: &TransactionHash) {
        if self.set.remove(hash) {
            self.order.retain(|entry| entry != hash);
        }
    }
}
