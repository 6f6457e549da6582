use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use ironfish_protocol::asset::AssetId;
use ironfish_protocol::block::{Block, BlockHeader, CommitmentState};
use ironfish_protocol::consensus::ConsensusParameters;
use ironfish_protocol::errors::ProofError;
use ironfish_protocol::hash::{BlockHash, Nullifier, TransactionHash};
use ironfish_protocol::merkle::{NoteTreeHasher, NullifierTreeHasher};
use ironfish_protocol::proof::{MinersFeeFactory, ProofVerifier, SpendingKey};
use ironfish_protocol::target::Work;
use ironfish_protocol::transaction::Transaction;
use ironfish_store::{Database, DatabaseKind, NullValue, TxRead, WriteTx};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::errors::{ChainError, ValidationError};
use crate::events::{ChainEvent, EventBus};
use crate::merkle::{MerkleTree, Witness};
use crate::migrations;
use crate::schema::{
    ALL_STORES,
    ASSETS,
    BLOCK_TRANSACTIONS,
    BlockStatus,
    CHILD_HASHES,
    HEADERS,
    HeaderRecord,
    MAIN_CHAIN,
    META,
    NOTE_LEAVES,
    NOTE_NODES,
    NOTE_TREE_META,
    NULLIFIER_LEAVES,
    NULLIFIER_NODES,
    NULLIFIER_POSITIONS,
    NULLIFIER_TREE_META,
    SEQUENCE_TO_HASHES,
    TRANSACTIONS,
    TransactionRecord,
    meta_keys,
};
use crate::verifier::Verifier;

mod apply;
mod orphans;
use orphans::OrphanPool;

/// Blocks the orphan pool holds before evicting the oldest.
const ORPHAN_POOL_CAPACITY: usize = 128;

/// Events the bus retains per lagging subscriber.
const EVENT_BUS_CAPACITY: usize = 1024;

// ADD BLOCK RESULT
// ================================================================================================

/// The outcome of offering a block to the chain.
#[derive(Debug)]
pub enum AddBlockResult {
    /// The block extended the main chain and is the new head.
    Added,
    /// The block was stored on a side chain; the head did not change.
    AddedAsFork,
    /// The block was already known; nothing happened.
    AlreadyAdded,
    /// The block's parent is unknown; it waits in the orphan pool.
    Orphan {
        /// The parent that must arrive before the block can be ingested.
        missing_parent: BlockHash,
    },
    /// The block failed verification and was not stored.
    Invalid(ValidationError),
}

#[derive(Debug, Clone, Copy)]
struct HeadInfo {
    hash: BlockHash,
    sequence: u32,
    work_total: Work,
}

// BLOCKCHAIN
// ================================================================================================

/// The blockchain engine: block storage, fork choice and the note and nullifier state.
///
/// All mutation flows through [`Blockchain::add_block`], which is externally serialized (it
/// takes `&mut self`) and performs each ingest inside a single storage transaction: the header
/// stores, both commitment trees and the asset registry can never be observed out of sync, even
/// across a crash.
///
/// A stored block is either on the main chain or on a fork; reorgs move blocks between the two
/// by disconnecting from the old head down to the fork point and connecting up to the new head.
/// Blocks with unknown parents wait in a bounded orphan pool and re-enter ingest when their
/// parent arrives. Blocks that fail verification are never stored.
pub struct Blockchain {
    db: Database,
    verifier: Verifier,
    note_tree: MerkleTree<NoteTreeHasher>,
    nullifier_tree: MerkleTree<NullifierTreeHasher>,
    miners_fee_factory: Arc<dyn MinersFeeFactory>,
    events: EventBus,
    orphans: OrphanPool,
    head: Option<HeadInfo>,
}

impl Blockchain {
    /// Opens the chain database at `path`, running any pending migrations.
    pub fn open(
        path: impl AsRef<Path>,
        params: ConsensusParameters,
        proofs: Arc<dyn ProofVerifier>,
        miners_fee_factory: Arc<dyn MinersFeeFactory>,
    ) -> Result<Self, ChainError> {
        let db = Database::open(
            path,
            DatabaseKind::Blockchain,
            ALL_STORES,
            &migrations::blockchain_schedule(),
        )?;

        let note_tree = MerkleTree::new(NoteTreeHasher, NOTE_LEAVES, NOTE_NODES, NOTE_TREE_META);
        let nullifier_tree = MerkleTree::new(
            NullifierTreeHasher,
            NULLIFIER_LEAVES,
            NULLIFIER_NODES,
            NULLIFIER_TREE_META,
        );

        let head = {
            let tx = db.read()?;
            match tx.get(&META, &meta_keys::HEAD)? {
                Some(hash) => {
                    let record: HeaderRecord = tx.require(&HEADERS, hash.as_bytes())?;
                    Some(HeadInfo {
                        hash,
                        sequence: record.header.sequence(),
                        work_total: record.work_total,
                    })
                },
                None => None,
            }
        };

        if let Some(head) = &head {
            info!(head = %head.hash, sequence = head.sequence, "opened chain");
        } else {
            info!("opened empty chain");
        }

        Ok(Self {
            db,
            verifier: Verifier::new(params, proofs),
            note_tree,
            nullifier_tree,
            miners_fee_factory,
            events: EventBus::new(EVENT_BUS_CAPACITY),
            orphans: OrphanPool::new(ORPHAN_POOL_CAPACITY),
            head,
        })
    }

    // PUBLIC ACCESSORS
    // --------------------------------------------------------------------------------------------

    /// Returns the consensus parameters the chain runs under.
    pub fn params(&self) -> &ConsensusParameters {
        self.verifier.params()
    }

    /// Returns the verifier the chain runs under, for callers (mempool, gossip) that apply the
    /// context-free tier themselves.
    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    /// Returns the hash of the current head, if the chain has one.
    pub fn head_hash(&self) -> Option<BlockHash> {
        self.head.as_ref().map(|head| head.hash)
    }

    /// Returns the sequence of the current head, or 0 for an empty chain.
    pub fn head_sequence(&self) -> u32 {
        self.head.as_ref().map(|head| head.sequence).unwrap_or(0)
    }

    /// Returns the header of the current head.
    pub fn head_header(&self) -> Result<BlockHeader, ChainError> {
        let head = self.head.as_ref().ok_or(ChainError::EmptyChain)?;
        Ok(self.require_record(&head.hash)?.header)
    }

    /// Returns the hash of the genesis block.
    pub fn genesis_hash(&self) -> Result<Option<BlockHash>, ChainError> {
        Ok(self.db.read()?.get(&META, &meta_keys::GENESIS)?)
    }

    /// Returns the stored header for `hash`, if any.
    pub fn get_header(&self, hash: &BlockHash) -> Result<Option<BlockHeader>, ChainError> {
        Ok(self.get_record(hash)?.map(|record| record.header))
    }

    /// Returns true if a block with this hash is stored, on any chain.
    pub fn has_block(&self, hash: &BlockHash) -> Result<bool, ChainError> {
        Ok(self.db.read()?.has(&HEADERS, hash.as_bytes())?)
    }

    /// Returns the full block for `hash`, if stored.
    pub fn get_block(&self, hash: &BlockHash) -> Result<Option<Block>, ChainError> {
        let tx = self.db.read()?;
        let Some(record) = tx.get(&HEADERS, hash.as_bytes())? else {
            return Ok(None);
        };
        let transactions: Vec<Transaction> = tx.require(&BLOCK_TRANSACTIONS, hash.as_bytes())?;
        Ok(Some(Block::new(record.header, transactions)))
    }

    /// Returns every stored header at `sequence`, across all forks.
    pub fn get_headers_at_sequence(
        &self,
        sequence: u32,
    ) -> Result<Vec<BlockHeader>, ChainError> {
        let tx = self.db.read()?;
        let mut headers = Vec::new();
        for entry in tx.iter_prefix(&SEQUENCE_TO_HASHES, &sequence)? {
            let ((_, hash), _) = entry.map_err(ChainError::Store)?;
            let record: HeaderRecord = tx.require(&HEADERS, &hash)?;
            headers.push(record.header);
        }
        Ok(headers)
    }

    /// Returns the main-chain hash at `sequence`, if the main chain reaches it.
    pub fn get_main_hash_at(&self, sequence: u32) -> Result<Option<BlockHash>, ChainError> {
        Ok(self.db.read()?.get(&MAIN_CHAIN, &sequence)?)
    }

    /// Returns true if `header` is on the main chain, i.e. an ancestor of (or equal to) the
    /// current head.
    pub fn is_head_chain(&self, header: &BlockHeader) -> Result<bool, ChainError> {
        Ok(self.get_main_hash_at(header.sequence())? == Some(header.hash()))
    }

    /// Returns the main-chain headers from `from` (exclusive) up to the head, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if `from` is not on the main chain.
    pub fn iterate_to_head(&self, from: &BlockHash) -> Result<Vec<BlockHeader>, ChainError> {
        let start = self.get_header(from)?.ok_or(ChainError::UnknownBlock(*from))?;
        if !self.is_head_chain(&start)? {
            return Err(ChainError::UnknownBlock(*from));
        }

        let mut headers = Vec::new();
        let mut sequence = start.sequence() + 1;
        while let Some(hash) = self.get_main_hash_at(sequence)? {
            headers.push(self.require_record(&hash)?.header);
            sequence += 1;
        }
        Ok(headers)
    }

    /// Returns the headers from `from` (inclusive) back to genesis, newest first, following
    /// parent links across forks.
    pub fn iterate_to_genesis(&self, from: &BlockHash) -> Result<Vec<BlockHeader>, ChainError> {
        let mut headers = Vec::new();
        let mut cursor = *from;
        loop {
            let header = self.get_header(&cursor)?.ok_or(ChainError::UnknownBlock(cursor))?;
            let done = header.is_genesis();
            cursor = header.previous_block_hash();
            headers.push(header);
            if done {
                return Ok(headers);
            }
        }
    }

    /// Returns the main-chain transaction record for `hash`, if confirmed.
    pub fn get_transaction(
        &self,
        hash: &TransactionHash,
    ) -> Result<Option<TransactionRecord>, ChainError> {
        Ok(self.db.read()?.get(&TRANSACTIONS, hash.as_bytes())?)
    }

    /// Returns the registered asset for `id`, if it exists on the main chain.
    pub fn get_asset(
        &self,
        id: &AssetId,
    ) -> Result<Option<ironfish_protocol::asset::Asset>, ChainError> {
        Ok(self.db.read()?.get(&ASSETS, id.as_bytes())?)
    }

    /// Returns true if `nullifier` has been revealed on the main chain.
    pub fn contains_nullifier(&self, nullifier: &Nullifier) -> Result<bool, ChainError> {
        Ok(self.db.read()?.has(&NULLIFIER_POSITIONS, nullifier.as_bytes())?)
    }

    /// Returns the current note tree commitment.
    pub fn note_commitment(&self) -> Result<CommitmentState, ChainError> {
        let tx = self.db.read()?;
        Ok(CommitmentState {
            root: self.note_tree.root(&tx)?,
            size: self.note_tree.size(&tx)?,
        })
    }

    /// Returns a witness for the note at `index` against the current note tree root.
    pub fn witness_note(&self, index: u32) -> Result<Witness, ChainError> {
        let tx = self.db.read()?;
        Ok(self.note_tree.witness(&tx, index)?)
    }

    /// Registers a subscriber on the chain event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.events.subscribe()
    }

    /// Creates the miner's fee transaction for a block at `sequence` through the proving layer.
    pub fn create_miners_fee(
        &self,
        fee: i64,
        sequence: u32,
        spending_key: &SpendingKey,
    ) -> Result<Transaction, ProofError> {
        self.miners_fee_factory.create_miners_fee(fee, sequence, spending_key)
    }

    /// Computes the tree commitments a block with `transactions` would have on top of the
    /// current head. Used by block template assembly; leaves the chain untouched.
    pub fn preview_commitments(
        &self,
        transactions: &[Transaction],
    ) -> Result<(CommitmentState, CommitmentState), ChainError> {
        let tx = self.db.write()?;
        for transaction in transactions {
            for spend in transaction.spends() {
                self.nullifier_tree.add(&tx, spend.nullifier.into_bytes())?;
            }
            for output in transaction.outputs() {
                self.note_tree.add(&tx, output.merkle_hash.into_bytes())?;
            }
        }
        let note = CommitmentState {
            root: self.note_tree.root(&tx)?,
            size: self.note_tree.size(&tx)?,
        };
        let nullifier = CommitmentState {
            root: self.nullifier_tree.root(&tx)?,
            size: self.nullifier_tree.size(&tx)?,
        };
        tx.abort()?;
        Ok((note, nullifier))
    }

    // ADD BLOCK
    // --------------------------------------------------------------------------------------------

    /// Offers a block to the chain.
    ///
    /// Runs context-free verification, resolves the parent, runs contextual verification and
    /// either connects the block, stores it as a fork, reorganizes to it, or rejects it. On a
    /// head change the corresponding connect and disconnect events are published after the
    /// storage transaction commits, in application order. Orphans waiting on this block are
    /// drained afterwards.
    pub fn add_block(&mut self, block: &Block) -> Result<AddBlockResult, ChainError> {
        let hash = block.hash();
        let header = block.header();

        if self.has_block(&hash)? {
            return Ok(AddBlockResult::AlreadyAdded);
        }

        if let Err(err) = self.verifier.verify_block(block, now_ms()) {
            debug!(block = %hash, %err, "rejecting block");
            return Ok(AddBlockResult::Invalid(err));
        }

        // Resolve the parent; without it the block can only wait.
        let parent = if header.is_genesis() {
            if self.head.is_some() {
                return Ok(AddBlockResult::Invalid(ValidationError::InvalidGenesis));
            }
            None
        } else {
            match self.get_record(&header.previous_block_hash())? {
                Some(record) => Some(record),
                None => {
                    let missing_parent = header.previous_block_hash();
                    debug!(block = %hash, parent = %missing_parent, "adding orphan");
                    self.orphans.insert(block.clone());
                    return Ok(AddBlockResult::Orphan { missing_parent });
                },
            }
        };

        if let Some(parent) = &parent
            && let Err(err) = self.verifier.verify_header_against_parent(header, &parent.header)
        {
            debug!(block = %hash, %err, "rejecting block against parent");
            return Ok(AddBlockResult::Invalid(err));
        }

        let work_total =
            parent.as_ref().map(|record| record.work_total).unwrap_or(Work::ZERO) + header.work();

        let tx = self.db.write()?;
        let mut events = Vec::new();
        let outcome = self.place_block(&tx, block, work_total, &mut events);

        match outcome {
            Ok((result, new_head)) => {
                tx.commit()?;
                if let Some(head) = new_head {
                    self.head = Some(head);
                }
                for event in events {
                    self.events.publish(event);
                }
                self.drain_orphans(&hash)?;
                Ok(result)
            },
            Err(ChainError::Validation(err)) => {
                tx.abort()?;
                warn!(block = %hash, %err, "block failed contextual verification");
                Ok(AddBlockResult::Invalid(err))
            },
            Err(err) => {
                tx.abort()?;
                Err(err)
            },
        }
    }

    // PLACEMENT
    // --------------------------------------------------------------------------------------------

    /// Decides where the block lands and applies the decision inside `tx`.
    fn place_block(
        &self,
        tx: &WriteTx,
        block: &Block,
        work_total: Work,
        events: &mut Vec<ChainEvent>,
    ) -> Result<(AddBlockResult, Option<HeadInfo>), ChainError> {
        let hash = block.hash();
        let header = block.header();
        self.track_latest(tx, header, &hash)?;

        let new_head =
            HeadInfo { hash, sequence: header.sequence(), work_total };

        match &self.head {
            // Genesis bootstraps the chain through the same path as every other block.
            None => {
                if !header.is_genesis() {
                    return Err(ValidationError::InvalidGenesis.into());
                }
                self.connect_block(tx, block, work_total, events)?;
                tx.put(&META, &meta_keys::GENESIS, &hash)?;
                info!(genesis = %hash, "connected genesis");
                Ok((AddBlockResult::Added, Some(new_head)))
            },

            Some(head) if header.previous_block_hash() == head.hash => {
                self.connect_block(tx, block, work_total, events)?;
                debug!(block = %hash, sequence = header.sequence(), "extended head");
                Ok((AddBlockResult::Added, Some(new_head)))
            },

            Some(head) => {
                self.store_fork(tx, block, work_total)?;

                let wins = work_total > head.work_total
                    || (work_total == head.work_total && hash < head.hash);
                if wins {
                    info!(
                        old_head = %head.hash,
                        new_head = %hash,
                        sequence = header.sequence(),
                        "reorganizing to heavier fork"
                    );
                    self.reorg(tx, &hash, head, events)?;
                    Ok((AddBlockResult::Added, Some(new_head)))
                } else {
                    debug!(block = %hash, sequence = header.sequence(), "stored fork block");
                    Ok((AddBlockResult::AddedAsFork, None))
                }
            },
        }
    }

    /// Stores a block on a side chain without touching tree or index state.
    fn store_fork(&self, tx: &WriteTx, block: &Block, work_total: Work) -> Result<(), ChainError> {
        let hash = block.hash();
        let header = block.header();

        let record =
            HeaderRecord { header: header.clone(), work_total, status: BlockStatus::Fork };
        tx.put(&HEADERS, hash.as_bytes(), &record)?;
        tx.put(&BLOCK_TRANSACTIONS, hash.as_bytes(), &block.transactions().to_vec())?;
        tx.put(&SEQUENCE_TO_HASHES, &(header.sequence(), *hash.as_bytes()), &NullValue)?;
        tx.put(
            &CHILD_HASHES,
            &(*header.previous_block_hash().as_bytes(), *hash.as_bytes()),
            &NullValue,
        )?;
        Ok(())
    }

    /// Atomically moves the main chain from `old_head` to the fork tipped by `new_tip`.
    ///
    /// Walks the fork back to the first main-chain ancestor, disconnects the old main chain
    /// down to that ancestor in reverse order, then connects the fork path in order. Any
    /// verification failure aborts the entire transaction, leaving the old chain in place.
    fn reorg(
        &self,
        tx: &WriteTx,
        new_tip: &BlockHash,
        old_head: &HeadInfo,
        events: &mut Vec<ChainEvent>,
    ) -> Result<(), ChainError> {
        // Fork path, tip first, down to (excluding) the common ancestor.
        let mut path = Vec::new();
        let mut cursor = *new_tip;
        let ancestor_sequence = loop {
            let record: HeaderRecord = tx.require(&HEADERS, cursor.as_bytes())?;
            if record.status == BlockStatus::Main {
                break record.header.sequence();
            }
            path.push(cursor);
            cursor = record.header.previous_block_hash();
        };

        for sequence in (ancestor_sequence + 1..=old_head.sequence).rev() {
            let hash: BlockHash = tx.require(&MAIN_CHAIN, &sequence)?;
            let block = self.load_block(tx, &hash)?;
            self.disconnect_block(tx, &block, events)?;
        }

        for hash in path.iter().rev() {
            let record: HeaderRecord = tx.require(&HEADERS, hash.as_bytes())?;
            let block = self.load_block(tx, hash)?;
            self.connect_block(tx, &block, record.work_total, events)?;
        }

        Ok(())
    }

    /// Re-offers any orphans that were waiting on `parent`, recursively.
    fn drain_orphans(&mut self, parent: &BlockHash) -> Result<(), ChainError> {
        for orphan in self.orphans.take_children(parent) {
            let hash = orphan.hash();
            match self.add_block(&orphan)? {
                AddBlockResult::Invalid(err) => {
                    debug!(block = %hash, %err, "dropped invalid orphan")
                },
                result => debug!(block = %hash, ?result, "drained orphan"),
            }
        }
        Ok(())
    }

    // HELPERS
    // --------------------------------------------------------------------------------------------

    /// Keeps the `latest` pointer on the highest-sequence header seen on any fork.
    fn track_latest(
        &self,
        tx: &WriteTx,
        header: &BlockHeader,
        hash: &BlockHash,
    ) -> Result<(), ChainError> {
        let newer = match tx.get(&META, &meta_keys::LATEST)? {
            Some(latest) => {
                let record: HeaderRecord = tx.require(&HEADERS, latest.as_bytes())?;
                record.header.sequence() < header.sequence()
            },
            None => true,
        };
        if newer {
            tx.put(&META, &meta_keys::LATEST, hash)?;
        }
        Ok(())
    }

    fn load_block<R: TxRead>(&self, tx: &R, hash: &BlockHash) -> Result<Block, ChainError> {
        let record: HeaderRecord = tx.require(&HEADERS, hash.as_bytes())?;
        let transactions: Vec<Transaction> = tx.require(&BLOCK_TRANSACTIONS, hash.as_bytes())?;
        Ok(Block::new(record.header, transactions))
    }

    fn get_record(&self, hash: &BlockHash) -> Result<Option<HeaderRecord>, ChainError> {
        Ok(self.db.read()?.get(&HEADERS, hash.as_bytes())?)
    }

    fn require_record(&self, hash: &BlockHash) -> Result<HeaderRecord, ChainError> {
        Ok(self.db.read()?.require(&HEADERS, hash.as_bytes())?)
    }

    pub(crate) fn record_status(
        &self,
        hash: &BlockHash,
    ) -> Result<Option<BlockStatus>, ChainError> {
        Ok(self.get_record(hash)?.map(|record| record.status))
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the UNIX epoch")
        .as_millis() as u64
}
