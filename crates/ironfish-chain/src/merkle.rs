use ironfish_protocol::TREE_DEPTH;
use ironfish_protocol::hash::MerkleRoot;
use ironfish_protocol::merkle::{MerkleHasher, zero_ladder};
use ironfish_store::{StoreDef, TxRead, WriteTx};

use crate::errors::TreeError;

const COUNT_KEY: u8 = 0;

const LADDER_LEN: usize = TREE_DEPTH as usize + 1;

// WITNESS
// ================================================================================================

/// Which side a sibling hash sits on along an authentication path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// One step of an authentication path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WitnessNode {
    /// The side the sibling sits on, relative to the path.
    pub side: Side,
    /// The sibling hash.
    pub hash: [u8; 32],
}

/// A proof that a leaf is contained in a tree of `tree_size` leaves with root `root_hash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Witness {
    /// Sibling hashes from the leaf up to the root.
    pub auth_path: Vec<WitnessNode>,
    /// The root the path folds up to.
    pub root_hash: MerkleRoot,
    /// The number of leaves in the tree the witness was taken at.
    pub tree_size: u32,
}

impl Witness {
    /// Returns true if folding `leaf` up the authentication path reproduces `root_hash`.
    pub fn verify<H: MerkleHasher>(&self, hasher: &H, leaf: &[u8; 32]) -> bool {
        if self.auth_path.len() != TREE_DEPTH as usize {
            return false;
        }
        let mut node = *leaf;
        for (depth, step) in self.auth_path.iter().enumerate() {
            node = match step.side {
                Side::Right => hasher.combine(depth as u8, &node, &step.hash),
                Side::Left => hasher.combine(depth as u8, &step.hash, &node),
            };
        }
        node == self.root_hash.into_bytes()
    }
}

// MERKLE TREE
// ================================================================================================

/// A store-backed, append-only Merkle tree of fixed height [`TREE_DEPTH`].
///
/// Leaves live at depth 0; absent right siblings take a precomputed per-depth zero hash. The
/// tree persists every leaf plus the hash of every complete subtree, which is exactly what is
/// needed to reproduce the root at any historical size and to produce witnesses: appending a
/// leaf never changes the hash of a node whose subtree consists entirely of earlier leaves.
///
/// All operations run inside a caller-provided storage transaction, so tree updates commit or
/// roll back together with whatever chain state they belong to.
pub struct MerkleTree<H: MerkleHasher> {
    hasher: H,
    leaves: StoreDef<u32, MerkleRoot>,
    nodes: StoreDef<(u8, u32), MerkleRoot>,
    meta: StoreDef<u8, u32>,
    zero: [[u8; 32]; LADDER_LEN],
}

impl<H: MerkleHasher> MerkleTree<H> {
    /// Creates a tree over the given stores.
    pub fn new(
        hasher: H,
        leaves: StoreDef<u32, MerkleRoot>,
        nodes: StoreDef<(u8, u32), MerkleRoot>,
        meta: StoreDef<u8, u32>,
    ) -> Self {
        let zero = zero_ladder(&hasher);
        Self { hasher, leaves, nodes, meta, zero }
    }

    // PUBLIC ACCESSORS
    // --------------------------------------------------------------------------------------------

    /// Returns the number of leaves in the tree.
    pub fn size<R: TxRead>(&self, tx: &R) -> Result<u32, TreeError> {
        Ok(tx.get(&self.meta, &COUNT_KEY)?.unwrap_or(0))
    }

    /// Returns the current root of the tree.
    pub fn root<R: TxRead>(&self, tx: &R) -> Result<MerkleRoot, TreeError> {
        let size = self.size(tx)?;
        self.root_at(tx, size)
    }

    /// Returns the root the tree had when it held `size` leaves.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` exceeds the current size.
    pub fn root_at<R: TxRead>(&self, tx: &R, size: u32) -> Result<MerkleRoot, TreeError> {
        let current = self.size(tx)?;
        if size > current {
            return Err(TreeError::SizeOutOfRange { size, current });
        }
        Ok(MerkleRoot::new(self.partial_chain(tx, size)?[TREE_DEPTH as usize]))
    }

    /// Returns a witness for the leaf at `index` against the current root.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is not a leaf of the tree.
    pub fn witness<R: TxRead>(&self, tx: &R, index: u32) -> Result<Witness, TreeError> {
        let size = self.size(tx)?;
        if index >= size {
            return Err(TreeError::LeafOutOfRange { index, size });
        }

        let partial = self.partial_chain(tx, size)?;
        let mut auth_path = Vec::with_capacity(TREE_DEPTH as usize);

        for depth in 0..TREE_DEPTH {
            let ancestor = index >> depth;
            let sibling = ancestor ^ 1;

            let hash = if ((sibling as u64) + 1) << depth <= size as u64 {
                self.complete_node(tx, depth, sibling)?
            } else if (sibling as u64) << depth >= size as u64 {
                self.zero[depth as usize]
            } else {
                partial[depth as usize]
            };

            let side = if ancestor & 1 == 0 { Side::Right } else { Side::Left };
            auth_path.push(WitnessNode { side, hash });
        }

        Ok(Witness {
            auth_path,
            root_hash: MerkleRoot::new(partial[TREE_DEPTH as usize]),
            tree_size: size,
        })
    }

    // PUBLIC MUTATORS
    // --------------------------------------------------------------------------------------------

    /// Appends a leaf and returns the new size of the tree.
    ///
    /// Stores the hash of every subtree the new leaf completes.
    pub fn add(&self, tx: &WriteTx, leaf: [u8; 32]) -> Result<u32, TreeError> {
        let size = self.size(tx)?;
        tx.put(&self.leaves, &size, &MerkleRoot::new(leaf))?;
        let new_size = size + 1;

        for depth in 0..TREE_DEPTH {
            if (new_size as u64) % (1u64 << (depth + 1)) != 0 {
                break;
            }
            let parent = ((new_size as u64 >> (depth + 1)) - 1) as u32;
            let left = self.complete_node(tx, depth, parent * 2)?;
            let right = self.complete_node(tx, depth, parent * 2 + 1)?;
            let hash = self.hasher.combine(depth, &left, &right);
            tx.put(&self.nodes, &(depth + 1, parent), &MerkleRoot::new(hash))?;
        }

        tx.put(&self.meta, &COUNT_KEY, &new_size)?;
        Ok(new_size)
    }

    /// Drops every leaf at index `size` and beyond, restoring the exact state the tree had when
    /// it held `size` leaves.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` exceeds the current size.
    pub fn truncate(&self, tx: &WriteTx, size: u32) -> Result<(), TreeError> {
        let current = self.size(tx)?;
        if size > current {
            return Err(TreeError::SizeOutOfRange { size, current });
        }
        if size == current {
            return Ok(());
        }

        tx.clear_range(&self.leaves, &size, None)?;
        for depth in 1..=TREE_DEPTH {
            // Nodes keep only complete subtrees; the first index whose subtree crosses the new
            // boundary and everything after it go.
            let cutoff = (size as u64 >> depth) as u32;
            tx.clear_range(&self.nodes, &(depth, cutoff), Some(&(depth + 1, 0)))?;
        }
        tx.put(&self.meta, &COUNT_KEY, &size)?;
        Ok(())
    }

    // HELPERS
    // --------------------------------------------------------------------------------------------

    /// Returns the hash of the complete subtree at (`depth`, `index`).
    ///
    /// Depth 0 reads the leaf store. Completeness is the caller's invariant; a miss here means
    /// the database lost data it wrote earlier.
    fn complete_node<R: TxRead>(&self, tx: &R, depth: u8, index: u32) -> Result<[u8; 32], TreeError> {
        let hash = if depth == 0 {
            tx.get(&self.leaves, &index)?
        } else {
            tx.get(&self.nodes, &(depth, index))?
        };
        Ok(hash
            .unwrap_or_else(|| {
                panic!("complete merkle node ({depth}, {index}) must exist after being written")
            })
            .into_bytes())
    }

    /// Returns, for every depth, the hash of the partial subtree containing the boundary of a
    /// tree of `size` leaves. The final entry is the root at `size`.
    fn partial_chain<R: TxRead>(
        &self,
        tx: &R,
        size: u32,
    ) -> Result<[[u8; 32]; LADDER_LEN], TreeError> {
        let mut chain = [[0u8; 32]; LADDER_LEN];
        chain[0] = self.zero[0];

        let mut acc = self.zero[0];
        for depth in 0..TREE_DEPTH {
            let index = size >> depth;
            acc = if index & 1 == 1 {
                let left = self.complete_node(tx, depth, index - 1)?;
                self.hasher.combine(depth, &left, &acc)
            } else {
                self.hasher.combine(depth, &acc, &self.zero[depth as usize])
            };
            chain[depth as usize + 1] = acc;
        }
        Ok(chain)
    }
}

// TESTS
// ================================================================================================
