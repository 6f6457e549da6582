use std::sync::Arc;

use ironfish_protocol::block::Block;
use tokio::sync::broadcast;

// CHAIN EVENT
// ================================================================================================

/// A main-chain mutation, published after the storage transaction that produced it committed.
///
/// During a reorg, disconnects are published from the old head down to the fork point, followed
/// by connects from the fork point up to the new head, in exactly the order the engine applied
/// them.
#[derive(Debug, Clone)]
pub enum ChainEvent {
    /// The block became part of the main chain.
    Connected(Arc<Block>),
    /// The block was removed from the main chain by a reorg.
    Disconnected(Arc<Block>),
}

// EVENT BUS
// ================================================================================================

/// Fan-out of [`ChainEvent`]s to any number of subscribers.
///
/// Subscribers drain their queue at their own cadence and never run on the engine's call path,
/// so a slow subscriber cannot stall block ingest. A subscriber that falls more than the bus
/// capacity behind observes a lag error on its receiver and must resynchronize through the
/// chain processor.
pub struct EventBus {
    sender: broadcast::Sender<ChainEvent>,
}

impl EventBus {
    /// Creates a bus retaining up to `capacity` undelivered events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Registers a new subscriber. Only events published after this call are delivered.
    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event to all current subscribers.
    pub fn publish(&self, event: ChainEvent) {
        // A send error only means there are no subscribers right now.
        let _ = self.sender.send(event);
    }
}

// TESTS
// ================================================================================================
