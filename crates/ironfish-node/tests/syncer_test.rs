//! Block syncer drives against mock peers built from real chains.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use ironfish_chain::testing::TestHarness;
use ironfish_node::syncer::{
    BlockSyncer,
    Direction,
    PeerClient,
    PeerError,
    PeerScore,
    SyncError,
    SyncerConfig,
    SyncerState,
};
use ironfish_protocol::block::Block;
use ironfish_protocol::hash::BlockHash;

/// A peer serving a fixed main chain, genesis first.
struct MockPeer {
    chain: Vec<Block>,
    index: HashMap<BlockHash, usize>,
}

impl MockPeer {
    fn new(chain: Vec<Block>) -> Self {
        let index = chain.iter().enumerate().map(|(i, b)| (b.hash(), i)).collect();
        Self { chain, index }
    }

    /// Builds a peer from a harness by walking its main chain.
    fn from_harness(harness: &TestHarness) -> Self {
        let mut blocks = Vec::new();
        let mut sequence = 1;
        while let Some(hash) = harness.chain.get_main_hash_at(sequence).unwrap() {
            blocks.push(harness.chain.get_block(&hash).unwrap().unwrap());
            sequence += 1;
        }
        Self::new(blocks)
    }
}

#[async_trait]
impl PeerClient for MockPeer {
    async fn get_blocks(
        &self,
        anchor: BlockHash,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<Block>, PeerError> {
        let Some(&position) = self.index.get(&anchor) else {
            return Err(PeerError::BlocksUnavailable);
        };
        let blocks = match direction {
            Direction::Forward => self.chain[position + 1..]
                .iter()
                .take(limit)
                .cloned()
                .collect(),
            Direction::Backward => self.chain[..=position]
                .iter()
                .rev()
                .take(limit)
                .cloned()
                .collect(),
        };
        Ok(blocks)
    }

    async fn tip(&self) -> Result<BlockHash, PeerError> {
        self.chain.last().map(|block| block.hash()).ok_or(PeerError::BlocksUnavailable)
    }
}

#[derive(Default)]
struct CountingScore(AtomicUsize);

impl PeerScore for CountingScore {
    fn demerit(&self, _reason: &str) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

fn syncer(config: SyncerConfig) -> (BlockSyncer, Arc<CountingScore>) {
    let score = Arc::new(CountingScore::default());
    (BlockSyncer::new(config, score.clone()), score)
}

#[tokio::test]
async fn empty_node_syncs_forward_to_the_peer_tip() {
    let mut source = TestHarness::with_node_id(1);
    for _ in 0..9 {
        source.mine_next(Vec::new());
    }
    let peer = MockPeer::from_harness(&source);

    let mut sink = TestHarness::with_node_id(2);
    let (syncer, score) = syncer(SyncerConfig::default());
    let mut states = syncer.state();

    let outcome = syncer.sync(&mut sink.chain, &peer).await.unwrap();

    assert_eq!(sink.chain.head_hash(), source.chain.head_hash());
    assert_eq!(sink.chain.head_sequence(), 10);
    assert_eq!(outcome.blocks_added, 9);
    assert_eq!(score.0.load(Ordering::Relaxed), 0);
    assert_eq!(*states.borrow_and_update(), SyncerState::Synced);
}

#[tokio::test]
async fn small_batches_converge_over_multiple_requests() {
    let mut source = TestHarness::with_node_id(1);
    for _ in 0..9 {
        source.mine_next(Vec::new());
    }
    let peer = MockPeer::from_harness(&source);

    let mut sink = TestHarness::with_node_id(2);
    let (syncer, _) = syncer(SyncerConfig {
        max_blocks_per_request: 2,
        ..SyncerConfig::default()
    });

    syncer.sync(&mut sink.chain, &peer).await.unwrap();
    assert_eq!(sink.chain.head_hash(), source.chain.head_hash());
}

#[tokio::test]
async fn forked_node_walks_backward_and_reorgs() {
    // The sink mined its own block; the peer's heavier chain does not contain it.
    let mut sink = TestHarness::with_node_id(1);
    sink.mine_next(Vec::new());

    let mut source = TestHarness::with_node_id(2);
    for _ in 0..4 {
        source.mine_next(Vec::new());
    }
    let peer = MockPeer::from_harness(&source);

    let (syncer, score) = syncer(SyncerConfig::default());
    let outcome = syncer.sync(&mut sink.chain, &peer).await.unwrap();

    assert_eq!(sink.chain.head_hash(), source.chain.head_hash());
    assert_eq!(sink.chain.head_sequence(), 5);
    assert!(outcome.blocks_added >= 4);
    assert_eq!(score.0.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn oversized_responses_are_demerited() {
    struct FloodingPeer {
        blocks: Vec<Block>,
    }

    #[async_trait]
    impl PeerClient for FloodingPeer {
        async fn get_blocks(
            &self,
            _anchor: BlockHash,
            _direction: Direction,
            _limit: usize,
        ) -> Result<Vec<Block>, PeerError> {
            Ok(self.blocks.clone())
        }

        async fn tip(&self) -> Result<BlockHash, PeerError> {
            Ok(self.blocks.last().unwrap().hash())
        }
    }

    let mut source = TestHarness::with_node_id(1);
    let mut blocks = Vec::new();
    for _ in 0..5 {
        blocks.push(source.mine_next(Vec::new()));
    }

    let mut sink = TestHarness::with_node_id(2);
    let (syncer, score) = syncer(SyncerConfig {
        max_blocks_per_request: 3,
        ..SyncerConfig::default()
    });

    let result = syncer.sync(&mut sink.chain, &FloodingPeer { blocks }).await;
    assert_matches!(result, Err(SyncError::InvalidResponse(_)));
    assert_eq!(score.0.load(Ordering::Relaxed), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_peers_time_out() {
    struct StalledPeer;

    #[async_trait]
    impl PeerClient for StalledPeer {
        async fn get_blocks(
            &self,
            _anchor: BlockHash,
            _direction: Direction,
            _limit: usize,
        ) -> Result<Vec<Block>, PeerError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }

        async fn tip(&self) -> Result<BlockHash, PeerError> {
            Ok(BlockHash::ZERO)
        }
    }

    let mut sink = TestHarness::new();
    let (syncer, _) = syncer(SyncerConfig {
        request_timeout_seconds: 1,
        ..SyncerConfig::default()
    });

    let result = syncer.sync(&mut sink.chain, &StalledPeer).await;
    assert_matches!(result, Err(SyncError::Peer(PeerError::Timeout)));
}

#[tokio::test]
async fn shutdown_unwinds_an_inflight_request() {
    struct HangingPeer;

    #[async_trait]
    impl PeerClient for HangingPeer {
        async fn get_blocks(
            &self,
            _anchor: BlockHash,
            _direction: Direction,
            _limit: usize,
        ) -> Result<Vec<Block>, PeerError> {
            futures_never().await
        }

        async fn tip(&self) -> Result<BlockHash, PeerError> {
            futures_never().await
        }
    }

    async fn futures_never<T>() -> T {
        std::future::pending().await
    }

    let mut sink = TestHarness::new();
    let syncer = BlockSyncer::new(
        SyncerConfig::default(),
        Arc::new(ironfish_node::syncer::NoopPeerScore),
    );

    let drive = syncer.sync(&mut sink.chain, &HangingPeer);
    tokio::pin!(drive);

    // Let the request get in flight, then pull the plug.
    tokio::select! {
        biased;
        _ = &mut drive => panic!("drive finished without shutdown"),
        _ = tokio::task::yield_now() => {},
    }
    syncer.trigger_shutdown();

    assert_matches!(drive.await, Err(SyncError::Shutdown));
}
