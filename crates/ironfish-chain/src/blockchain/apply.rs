//! Connecting blocks to and disconnecting blocks from the main chain.
//!
//! Everything here runs inside the single write transaction owned by `add_block`, so a failure
//! at any point rolls the whole mutation back.

use std::sync::Arc;

use ironfish_protocol::asset::Asset;
use ironfish_protocol::block::Block;
use ironfish_protocol::hash::BlockHash;
use ironfish_protocol::target::Work;
use ironfish_protocol::transaction::{BurnDescription, MintDescription, Transaction};
use ironfish_store::{NullValue, TxRead, WriteTx};

use super::Blockchain;
use crate::errors::{BurnReason, ChainError, MintReason, SpendReason, TreeError, ValidationError};
use crate::events::ChainEvent;
use crate::schema::{
    ASSETS,
    BLOCK_TRANSACTIONS,
    BlockStatus,
    CHILD_HASHES,
    HEADERS,
    HeaderRecord,
    MAIN_CHAIN,
    META,
    NULLIFIER_POSITIONS,
    SEQUENCE_TO_HASHES,
    TRANSACTIONS,
    TransactionRecord,
    meta_keys,
};

impl Blockchain {
    // CONNECT
    // --------------------------------------------------------------------------------------------

    /// Applies a block on top of the current tree and asset state and makes it the head.
    ///
    /// The caller guarantees the block's parent state is the state in `tx`. Contextual
    /// verification failures surface as [`ChainError::Validation`].
    pub(super) fn connect_block(
        &self,
        tx: &WriteTx,
        block: &Block,
        work_total: Work,
        events: &mut Vec<ChainEvent>,
    ) -> Result<(), ChainError> {
        let header = block.header();
        let hash = block.hash();
        let sequence = header.sequence();

        for transaction in block.transactions() {
            self.apply_transaction(tx, transaction, hash, sequence)?;
        }

        // The trees must now agree with the header's commitments exactly.
        let note_size = self.note_tree.size(tx)?;
        let note_root = self.note_tree.root(tx)?;
        if note_size != header.note_commitment().size || note_root != header.note_commitment().root
        {
            return Err(ValidationError::InvalidRoot { tree: "note" }.into());
        }
        let nullifier_size = self.nullifier_tree.size(tx)?;
        let nullifier_root = self.nullifier_tree.root(tx)?;
        if nullifier_size != header.nullifier_commitment().size
            || nullifier_root != header.nullifier_commitment().root
        {
            return Err(ValidationError::InvalidRoot { tree: "nullifier" }.into());
        }

        let record =
            HeaderRecord { header: header.clone(), work_total, status: BlockStatus::Main };
        tx.put(&HEADERS, hash.as_bytes(), &record)?;
        tx.put(&BLOCK_TRANSACTIONS, hash.as_bytes(), &block.transactions().to_vec())?;
        tx.put(&SEQUENCE_TO_HASHES, &(sequence, *hash.as_bytes()), &NullValue)?;
        if !header.is_genesis() {
            tx.put(
                &CHILD_HASHES,
                &(*header.previous_block_hash().as_bytes(), *hash.as_bytes()),
                &NullValue,
            )?;
        }
        tx.put(&MAIN_CHAIN, &sequence, &hash)?;
        tx.put(&META, &meta_keys::HEAD, &hash)?;

        events.push(ChainEvent::Connected(Arc::new(block.clone())));
        Ok(())
    }

    fn apply_transaction(
        &self,
        tx: &WriteTx,
        transaction: &Transaction,
        block_hash: BlockHash,
        sequence: u32,
    ) -> Result<(), ChainError> {
        let transaction_hash = transaction.hash();

        for spend in transaction.spends() {
            // The spend's proof was built against a past note tree root; that root must be
            // genuine and recent enough.
            let note_size = self.note_tree.size(tx)?;
            match self.note_tree.root_at(tx, spend.tree_size) {
                Ok(root) if root == spend.root_hash => {},
                Ok(_) => {
                    return Err(ValidationError::InvalidSpend(SpendReason::UnknownRoot).into());
                },
                Err(TreeError::SizeOutOfRange { .. }) => {
                    return Err(ValidationError::InvalidSpend(SpendReason::UnknownRoot).into());
                },
                Err(err) => return Err(err.into()),
            }
            if note_size - spend.tree_size > self.verifier.params().max_spend_root_age {
                return Err(ValidationError::InvalidSpend(SpendReason::StaleRoot).into());
            }

            if tx.has(&NULLIFIER_POSITIONS, spend.nullifier.as_bytes())? {
                return Err(ValidationError::InvalidSpend(SpendReason::NullifierSeen(
                    spend.nullifier,
                ))
                .into());
            }
            let new_size = self.nullifier_tree.add(tx, spend.nullifier.into_bytes())?;
            tx.put(&NULLIFIER_POSITIONS, spend.nullifier.as_bytes(), &(new_size - 1))?;
        }

        for output in transaction.outputs() {
            self.note_tree.add(tx, output.merkle_hash.into_bytes())?;
        }

        for mint in transaction.mints() {
            self.apply_mint(tx, mint, transaction_hash, block_hash, sequence)?;
        }
        for burn in transaction.burns() {
            self.apply_burn(tx, burn)?;
        }

        tx.put(
            &TRANSACTIONS,
            transaction_hash.as_bytes(),
            &TransactionRecord {
                block_hash,
                sequence,
                transaction: transaction.clone(),
            },
        )?;

        Ok(())
    }

    fn apply_mint(
        &self,
        tx: &WriteTx,
        mint: &MintDescription,
        transaction_hash: ironfish_protocol::hash::TransactionHash,
        block_hash: BlockHash,
        sequence: u32,
    ) -> Result<(), ChainError> {
        let asset_id = mint.asset_id();
        let ownership_active =
            self.verifier.params().enable_asset_ownership.is_active(sequence);

        if !ownership_active && mint.transfer_ownership_to.is_some() {
            return Err(ValidationError::InvalidMint(MintReason::OwnershipNotActive).into());
        }

        match tx.get(&ASSETS, asset_id.as_bytes())? {
            None => {
                let mut asset = Asset {
                    id: asset_id,
                    creator: mint.creator,
                    owner: mint.creator,
                    name: mint.name,
                    metadata: mint.metadata,
                    nonce: mint.nonce,
                    supply: 0,
                    created_transaction_hash: transaction_hash,
                    first_block_hash: Some(block_hash),
                    first_sequence: Some(sequence),
                };
                asset
                    .mint(mint.value)
                    .map_err(|_| ValidationError::InvalidMint(MintReason::SupplyOverflow))?;
                if ownership_active && let Some(new_owner) = mint.transfer_ownership_to {
                    asset.owner = new_owner;
                }
                tx.put(&ASSETS, asset_id.as_bytes(), &asset)?;
            },
            Some(mut asset) => {
                if ownership_active {
                    if mint.owner != asset.owner {
                        return Err(ValidationError::InvalidMint(MintReason::NotOwner).into());
                    }
                } else if mint.creator != asset.creator {
                    return Err(ValidationError::InvalidMint(MintReason::NotCreator).into());
                }
                asset
                    .mint(mint.value)
                    .map_err(|_| ValidationError::InvalidMint(MintReason::SupplyOverflow))?;
                if ownership_active && let Some(new_owner) = mint.transfer_ownership_to {
                    asset.owner = new_owner;
                }
                tx.put(&ASSETS, asset_id.as_bytes(), &asset)?;
            },
        }

        Ok(())
    }

    fn apply_burn(&self, tx: &WriteTx, burn: &BurnDescription) -> Result<(), ChainError> {
        let Some(mut asset) = tx.get(&ASSETS, burn.asset_id.as_bytes())? else {
            return Err(ValidationError::InvalidBurn(BurnReason::UnknownAsset).into());
        };
        asset
            .burn(burn.value)
            .map_err(|_| ValidationError::InvalidBurn(BurnReason::InsufficientSupply))?;
        tx.put(&ASSETS, burn.asset_id.as_bytes(), &asset)?;
        Ok(())
    }

    // DISCONNECT
    // --------------------------------------------------------------------------------------------

    /// Removes the current head block from the main chain, restoring its parent's state.
    ///
    /// The block's header record stays, marked as a fork; transactions return to the caller via
    /// the emitted event so the mempool can reconsider them.
    pub(super) fn disconnect_block(
        &self,
        tx: &WriteTx,
        block: &Block,
        events: &mut Vec<ChainEvent>,
    ) -> Result<(), ChainError> {
        let header = block.header();
        let hash = block.hash();
        let parent: HeaderRecord =
            tx.require(&HEADERS, header.previous_block_hash().as_bytes())?;

        self.note_tree.truncate(tx, parent.header.note_commitment().size)?;
        self.nullifier_tree.truncate(tx, parent.header.nullifier_commitment().size)?;

        for transaction in block.transactions().iter().rev() {
            let transaction_hash = transaction.hash();

            for spend in transaction.spends() {
                tx.del(&NULLIFIER_POSITIONS, spend.nullifier.as_bytes())?;
            }
            for mint in transaction.mints().iter().rev() {
                self.revert_mint(tx, mint, transaction_hash, header.sequence())?;
            }
            for burn in transaction.burns().iter().rev() {
                let mut asset = tx.require(&ASSETS, burn.asset_id.as_bytes())?;
                asset
                    .mint(burn.value)
                    .expect("restoring a burned supply cannot overflow");
                tx.put(&ASSETS, burn.asset_id.as_bytes(), &asset)?;
            }

            tx.del(&TRANSACTIONS, transaction_hash.as_bytes())?;
        }

        tx.del(&MAIN_CHAIN, &header.sequence())?;
        let mut record: HeaderRecord = tx.require(&HEADERS, hash.as_bytes())?;
        record.status = BlockStatus::Fork;
        tx.put(&HEADERS, hash.as_bytes(), &record)?;
        tx.put(&META, &meta_keys::HEAD, &header.previous_block_hash())?;

        events.push(ChainEvent::Disconnected(Arc::new(block.clone())));
        Ok(())
    }

    fn revert_mint(
        &self,
        tx: &WriteTx,
        mint: &MintDescription,
        transaction_hash: ironfish_protocol::hash::TransactionHash,
        sequence: u32,
    ) -> Result<(), ChainError> {
        let asset_id = mint.asset_id();
        let mut asset: Asset = tx.require(&ASSETS, asset_id.as_bytes())?;

        if asset.created_transaction_hash == transaction_hash && asset.supply == mint.value {
            // This mint registered the asset; undo the registration entirely.
            tx.del(&ASSETS, asset_id.as_bytes())?;
            return Ok(());
        }

        asset
            .burn(mint.value)
            .expect("reverting a mint cannot exceed the circulating supply");
        if self.verifier.params().enable_asset_ownership.is_active(sequence)
            && mint.transfer_ownership_to.is_some()
        {
            asset.owner = mint.owner;
        }
        tx.put(&ASSETS, asset_id.as_bytes(), &asset)?;
        Ok(())
    }
}
