pub mod collector;
pub mod router;

pub use collector::{SelectionCollector, SelectionRequest};
pub use router::{ReactionGate, ReactionRouter};
