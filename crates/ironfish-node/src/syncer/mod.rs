use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ironfish_chain::{AddBlockResult, Blockchain, ChainError};
use ironfish_protocol::block::Block;
use ironfish_protocol::hash::BlockHash;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

// PEER INTERFACE
// ================================================================================================

/// Which way a block request walks the chain from its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Blocks after the anchor, oldest first.
    Forward,
    /// The anchor's block and its ancestors, newest first.
    Backward,
}

/// Why the chain received a block; affects logging and priority, never validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSource {
    /// Announced by a peer in real time.
    Gossip,
    /// Pulled during sync.
    Syncing,
}

/// A peer-side failure of a block request.
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("peer did not answer in time")]
    Timeout,
    #[error("peer response was malformed: {0}")]
    InvalidResponse(String),
    #[error("peer does not have the requested blocks")]
    BlocksUnavailable,
}

/// The block-sync view of the peer network.
///
/// Implementations wrap one remote peer. Requests are single-flighted per anchor by the syncer's
/// sequential drive; duplicate responses are harmless because block ingest is idempotent.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Requests up to `limit` blocks anchored at `anchor`, walking `direction`.
    async fn get_blocks(
        &self,
        anchor: BlockHash,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<Block>, PeerError>;

    /// Returns the hash of the peer's heaviest tip.
    async fn tip(&self) -> Result<BlockHash, PeerError>;
}

/// Receives reputation complaints about a peer.
pub trait PeerScore: Send + Sync {
    /// Records that the peer violated protocol or served bad data.
    fn demerit(&self, reason: &str);
}

/// A [`PeerScore`] that ignores everything, for callers without reputation tracking.
pub struct NoopPeerScore;

impl PeerScore for NoopPeerScore {
    fn demerit(&self, _reason: &str) {}
}

// CONFIG
// ================================================================================================

/// Configuration of the block syncer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncerConfig {
    /// Blocks requested per message; a peer answering with more is demerited.
    pub max_blocks_per_request: usize,
    /// Seconds before an in-flight request times out.
    pub request_timeout_seconds: u64,
    /// Blocks buffered while walking backward before the peer is considered hostile.
    pub max_backward_blocks: usize,
}

impl Default for SyncerConfig {
    fn default() -> Self {
        Self {
            max_blocks_per_request: 64,
            request_timeout_seconds: 15,
            max_backward_blocks: 4096,
        }
    }
}

// STATE
// ================================================================================================

/// The observable state of the syncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncerState {
    /// Not driving any peer.
    Idle,
    /// Pulling blocks forward from the local head.
    RequestingFromHead,
    /// Walking backward from a foreign tip toward a locally known ancestor.
    SyncingBackward,
    /// Applying buffered blocks, ancestor first.
    ConnectingForward,
    /// The local head matches the peer's tip.
    Synced,
}

/// A completed sync drive.
#[derive(Debug)]
pub struct SyncOutcome {
    /// Blocks accepted into the chain during the drive.
    pub blocks_added: usize,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("peer request failed")]
    Peer(#[from] PeerError),
    #[error("peer violated the sync protocol: {0}")]
    InvalidResponse(String),
    #[error("sync was shut down")]
    Shutdown,
    #[error(transparent)]
    Chain(#[from] ChainError),
}

// BLOCK SYNCER
// ================================================================================================

/// A state machine that drives the local chain toward a peer's heaviest tip.
///
/// The drive starts by pulling blocks forward from the local head. When the peer's chain does
/// not extend the local head (the anchor is unknown to the peer, or a pulled block does not
/// connect), the syncer walks backward from the peer's tip, buffering blocks until one links to
/// a locally known header, then connects the buffer forward; the chain's own fork choice takes
/// care of the reorg. Progress is observable through a [`watch`] channel of [`SyncerState`] and
/// a cycle counter that ticks once per completed connect cycle; a shutdown signal unwinds the
/// drive at the next suspension point.
pub struct BlockSyncer {
    config: SyncerConfig,
    score: Arc<dyn PeerScore>,
    state_tx: watch::Sender<SyncerState>,
    cycles_tx: watch::Sender<u64>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl BlockSyncer {
    /// Creates a syncer.
    pub fn new(config: SyncerConfig, score: Arc<dyn PeerScore>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, _) = watch::channel(SyncerState::Idle);
        let (cycles_tx, _) = watch::channel(0);
        Self { config, score, state_tx, cycles_tx, shutdown_tx, shutdown_rx }
    }

    /// Returns a receiver observing every state transition of the syncer.
    pub fn state(&self) -> watch::Receiver<SyncerState> {
        self.state_tx.subscribe()
    }

    /// Returns a receiver that ticks after every completed connect cycle.
    pub fn cycles(&self) -> watch::Receiver<u64> {
        self.cycles_tx.subscribe()
    }

    /// Asks a running drive to unwind at its next suspension point.
    pub fn trigger_shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Drives `chain` toward `peer`'s tip until the head converges or an error surfaces.
    ///
    /// Errors are never fatal to the node: the syncer returns to `Idle` and the caller demotes
    /// or retries the peer.
    pub async fn sync(
        &self,
        chain: &mut Blockchain,
        peer: &dyn PeerClient,
    ) -> Result<SyncOutcome, SyncError> {
        let result = self.drive(chain, peer).await;
        if result.is_err() {
            self.state_tx.send_replace(SyncerState::Idle);
        }
        result
    }

    async fn drive(
        &self,
        chain: &mut Blockchain,
        peer: &dyn PeerClient,
    ) -> Result<SyncOutcome, SyncError> {
        let mut blocks_added = 0;
        let mut state = SyncerState::RequestingFromHead;
        let mut backward_anchor: Option<BlockHash> = None;
        let mut backward_buffer: Vec<Block> = Vec::new();

        loop {
            self.state_tx.send_replace(state);

            match state {
                SyncerState::Idle | SyncerState::Synced => break,

                SyncerState::RequestingFromHead => {
                    let head = chain.head_hash().ok_or_else(|| {
                        SyncError::Chain(ChainError::EmptyChain)
                    })?;

                    match self.request(peer, head, Direction::Forward).await {
                        Err(SyncError::Peer(PeerError::BlocksUnavailable)) => {
                            // The peer does not know our head; its chain forks below us.
                            debug!(%head, "peer cannot extend our head, walking backward");
                            backward_anchor = Some(self.request_tip(peer).await?);
                            state = SyncerState::SyncingBackward;
                        },
                        Err(err) => return Err(err.into()),
                        Ok(blocks) if blocks.is_empty() => {
                            state = SyncerState::Synced;
                        },
                        Ok(blocks) => {
                            let count = blocks.len();
                            for block in &blocks {
                                match chain.add_block(block)? {
                                    AddBlockResult::Added | AddBlockResult::AlreadyAdded => {
                                        blocks_added += 1;
                                    },
                                    AddBlockResult::AddedAsFork
                                    | AddBlockResult::Orphan { .. } => {
                                        // Need the ancestry of this branch before going on.
                                        backward_anchor =
                                            Some(block.header().previous_block_hash());
                                        state = SyncerState::SyncingBackward;
                                        break;
                                    },
                                    AddBlockResult::Invalid(err) => {
                                        self.score.demerit("served an invalid block");
                                        return Err(SyncError::InvalidResponse(format!(
                                            "invalid block during forward sync: {err}"
                                        )));
                                    },
                                }
                            }
                            if state == SyncerState::RequestingFromHead
                                && count < self.config.max_blocks_per_request
                            {
                                state = SyncerState::Synced;
                            }
                            self.cycles_tx.send_modify(|cycles| *cycles += 1);
                        },
                    }
                },

                SyncerState::SyncingBackward => {
                    let anchor =
                        backward_anchor.take().expect("backward state always has an anchor");
                    let blocks = self.request(peer, anchor, Direction::Backward).await?;
                    if blocks.is_empty() {
                        self.score.demerit("no blocks for an anchor it announced");
                        return Err(SyncError::InvalidResponse(
                            "empty backward response".into(),
                        ));
                    }

                    backward_buffer.extend(blocks);
                    if backward_buffer.len() > self.config.max_backward_blocks {
                        self.score.demerit("backward walk exceeded the depth bound");
                        return Err(SyncError::InvalidResponse(
                            "backward walk too deep".into(),
                        ));
                    }

                    let oldest = backward_buffer.last().expect("buffer is non-empty");
                    let parent = oldest.header().previous_block_hash();
                    if oldest.header().is_genesis() || chain.has_block(&parent)? {
                        state = SyncerState::ConnectingForward;
                    } else {
                        backward_anchor = Some(parent);
                    }
                },

                SyncerState::ConnectingForward => {
                    for block in backward_buffer.drain(..).rev() {
                        match chain.add_block(&block)? {
                            AddBlockResult::Invalid(err) => {
                                self.score.demerit("served an invalid ancestor");
                                return Err(SyncError::InvalidResponse(format!(
                                    "invalid block during connect: {err}"
                                )));
                            },
                            AddBlockResult::Orphan { missing_parent } => {
                                self.score.demerit("backward walk skipped a block");
                                return Err(SyncError::InvalidResponse(format!(
                                    "connect hit a gap at parent {missing_parent}"
                                )));
                            },
                            _ => blocks_added += 1,
                        }
                    }
                    self.cycles_tx.send_modify(|cycles| *cycles += 1);
                    info!(head = ?chain.head_hash(), "connected backward batch");
                    state = SyncerState::RequestingFromHead;
                },
            }
        }

        self.state_tx.send_replace(state);
        Ok(SyncOutcome { blocks_added })
    }

    // REQUEST PLUMBING
    // --------------------------------------------------------------------------------------------

    /// Issues one block request with the configured timeout and shutdown handling.
    async fn request(
        &self,
        peer: &dyn PeerClient,
        anchor: BlockHash,
        direction: Direction,
    ) -> Result<Vec<Block>, SyncError> {
        let limit = self.config.max_blocks_per_request;
        debug!(%anchor, ?direction, limit, source = ?BlockSource::Syncing, "requesting blocks");

        let blocks = self.bounded(peer.get_blocks(anchor, direction, limit)).await?;
        if blocks.len() > limit {
            self.score.demerit("oversized block response");
            return Err(SyncError::InvalidResponse(format!(
                "{} blocks exceeds the {} cap",
                blocks.len(),
                limit
            )));
        }
        Ok(blocks)
    }

    async fn request_tip(&self, peer: &dyn PeerClient) -> Result<BlockHash, SyncError> {
        self.bounded(peer.tip()).await
    }

    /// Runs a peer future under the request timeout and the shutdown signal.
    async fn bounded<T>(
        &self,
        future: impl Future<Output = Result<T, PeerError>>,
    ) -> Result<T, SyncError> {
        let timeout = Duration::from_secs(self.config.request_timeout_seconds);
        let mut shutdown = self.shutdown_rx.clone();

        tokio::select! {
            result = tokio::time::timeout(timeout, future) => match result {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(SyncError::Peer(err)),
                Err(_) => {
                    warn!("peer request timed out");
                    Err(SyncError::Peer(PeerError::Timeout))
                },
            },
            _ = shutdown.wait_for(|stop| *stop) => Err(SyncError::Shutdown),
        }
    }
}
