pub mod blockchain;
pub mod errors;
pub mod events;
pub mod merkle;
pub mod migrations;
pub mod processor;
pub mod schema;
pub mod verifier;

#[cfg(any(feature = "testing", test))]
pub mod testing;

// RE-EXPORTS
// ================================================================================================

pub use blockchain::{AddBlockResult, Blockchain};
pub use errors::{BurnReason, ChainError, MintReason, SpendReason, TreeError, ValidationError};
pub use events::{ChainEvent, EventBus};
pub use merkle::{MerkleTree, Side, Witness, WitnessNode};
pub use processor::ChainProcessor;
pub use verifier::Verifier;
