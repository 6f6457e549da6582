use std::collections::{HashMap, VecDeque};

use ironfish_protocol::block::Block;
use ironfish_protocol::hash::BlockHash;

// ORPHAN POOL
// ================================================================================================

/// A bounded, in-memory pool of blocks whose parents are not yet known.
///
/// Orphanhood is transient: either the parent arrives through sync and the orphan is drained
/// back into ingest, or the orphan ages out. Eviction is oldest-first.
pub struct OrphanPool {
    by_parent: HashMap<BlockHash, Vec<Block>>,
    hashes: HashMap<BlockHash, BlockHash>,
    arrival: VecDeque<BlockHash>,
    capacity: usize,
}

impl OrphanPool {
    /// Creates a pool holding at most `capacity` blocks.
    pub fn new(capacity: usize) -> Self {
        Self {
            by_parent: HashMap::new(),
            hashes: HashMap::new(),
            arrival: VecDeque::new(),
            capacity,
        }
    }

    /// Returns the number of blocks in the pool.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    /// Returns true if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Returns true if a block with this hash is waiting in the pool.
    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.hashes.contains_key(hash)
    }

    /// Adds a block to the pool, evicting the oldest entry when full.
    pub fn insert(&mut self, block: Block) {
        let hash = block.hash();
        if self.hashes.contains_key(&hash) {
            return;
        }
        while self.hashes.len() >= self.capacity {
            self.evict_oldest();
        }

        let parent = block.header().previous_block_hash();
        self.hashes.insert(hash, parent);
        self.arrival.push_back(hash);
        self.by_parent.entry(parent).or_default().push(block);
    }

    /// Removes and returns every orphan waiting on `parent`.
    pub fn take_children(&mut self, parent: &BlockHash) -> Vec<Block> {
        let children = self.by_parent.remove(parent).unwrap_or_default();
        for child in &children {
            self.hashes.remove(&child.hash());
        }
        self.arrival.retain(|hash| self.hashes.contains_key(hash));
        children
    }

    fn evict_oldest(&mut self) {
        let Some(hash) = self.arrival.pop_front() else {
            return;
        };
        if let Some(parent) = self.hashes.remove(&hash)
            && let Some(siblings) = self.by_parent.get_mut(&parent)
        {
            siblings.retain(|block| block.hash() != hash);
            if siblings.is_empty() {
                self.by_parent.remove(&parent);
            }
        }
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use ironfish_protocol::testing::header_with_sequence;
    use ironfish_protocol::block::Block;

    use super::OrphanPool;

    fn block(sequence: u32) -> Block {
        Block::new(header_with_sequence(sequence), Vec::new())
    }

    #[test]
    fn children_are_drained_by_parent() {
        let mut pool = OrphanPool::new(8);
        let a = block(5);
        let parent = a.header().previous_block_hash();
        pool.insert(a.clone());

        assert!(pool.contains(&a.hash()));
        let drained = pool.take_children(&parent);
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].hash(), a.hash());
        assert!(pool.is_empty());
    }

    #[test]
    fn duplicate_inserts_are_ignored() {
        let mut pool = OrphanPool::new(8);
        pool.insert(block(5));
        pool.insert(block(5));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn eviction_is_oldest_first() {
        let mut pool = OrphanPool::new(2);
        let first = block(5);
        pool.insert(first.clone());
        pool.insert(block(6));
        pool.insert(block(7));

        assert_eq!(pool.len(), 2);
        assert!(!pool.contains(&first.hash()));
    }
}
