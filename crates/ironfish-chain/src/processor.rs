use std::sync::Arc;

use ironfish_protocol::hash::BlockHash;
use tracing::debug;

use crate::blockchain::Blockchain;
use crate::errors::ChainError;
use crate::events::ChainEvent;
use crate::schema::BlockStatus;

// CHAIN PROCESSOR
// ================================================================================================

/// Replays main-chain mutations to a subscriber that keeps its own head.
///
/// A subscriber (wallet, indexer) persists the hash of the last block it processed. On each
/// [`ChainProcessor::update`], the processor walks from that head to the chain's head along the
/// minimum-cost path: if the subscriber's head fell off the main chain it is disconnected back
/// to the fork point first, then the main chain is connected forward. Subscribers must be
/// idempotent under replay; crashing between the handler and persisting the new head only means
/// seeing the same event again.
pub struct ChainProcessor {
    head: Option<BlockHash>,
}

impl ChainProcessor {
    /// Creates a processor resuming from `head`, or from nothing when the subscriber is new.
    pub fn new(head: Option<BlockHash>) -> Self {
        Self { head }
    }

    /// Returns the hash of the last block handed to the subscriber.
    pub fn head(&self) -> Option<BlockHash> {
        self.head
    }

    /// Walks the subscriber from its head to the chain's current head, invoking `on_event` for
    /// every disconnect and connect along the way.
    ///
    /// Returns the number of events emitted.
    pub fn update<F>(&mut self, chain: &Blockchain, mut on_event: F) -> Result<usize, ChainError>
    where
        F: FnMut(&ChainEvent),
    {
        let Some(chain_head) = chain.head_hash() else {
            return Ok(0);
        };

        let mut emitted = 0;
        while self.head != Some(chain_head) {
            match self.head {
                // A new subscriber starts at genesis.
                None => {
                    let genesis =
                        chain.genesis_hash()?.ok_or(ChainError::EmptyChain)?;
                    let block =
                        chain.get_block(&genesis)?.ok_or(ChainError::UnknownBlock(genesis))?;
                    on_event(&ChainEvent::Connected(Arc::new(block)));
                    emitted += 1;
                    self.head = Some(genesis);
                },

                Some(current) => {
                    let header = chain
                        .get_header(&current)?
                        .ok_or(ChainError::UnknownBlock(current))?;

                    match chain.record_status(&current)? {
                        // Fell off the main chain: step backward toward the fork point.
                        Some(BlockStatus::Fork) => {
                            let block = chain
                                .get_block(&current)?
                                .ok_or(ChainError::UnknownBlock(current))?;
                            debug!(block = %current, "processor disconnecting");
                            on_event(&ChainEvent::Disconnected(Arc::new(block)));
                            emitted += 1;
                            self.head = Some(header.previous_block_hash());
                        },

                        // On the main chain: step forward toward the head.
                        Some(BlockStatus::Main) => {
                            let next = chain
                                .get_main_hash_at(header.sequence() + 1)?
                                .ok_or(ChainError::UnknownBlock(chain_head))?;
                            let block =
                                chain.get_block(&next)?.ok_or(ChainError::UnknownBlock(next))?;
                            on_event(&ChainEvent::Connected(Arc::new(block)));
                            emitted += 1;
                            self.head = Some(next);
                        },

                        None => return Err(ChainError::UnknownBlock(current)),
                    }
                },
            }
        }

        Ok(emitted)
    }
}
