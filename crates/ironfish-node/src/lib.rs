pub mod config;
pub mod mempool;
pub mod priority_queue;
pub mod syncer;

// RE-EXPORTS
// ================================================================================================

pub use config::{ConfigError, NodeConfig};
pub use mempool::{
    AcceptResult,
    Eviction,
    EvictionReason,
    FeeEstimator,
    FeeEstimatorConfig,
    Mempool,
    MempoolConfig,
    RejectReason,
};
pub use priority_queue::PriorityQueue;
pub use syncer::{
    BlockSource,
    BlockSyncer,
    Direction,
    NoopPeerScore,
    PeerClient,
    PeerError,
    PeerScore,
    SyncError,
    SyncOutcome,
    SyncerConfig,
    SyncerState,
};
