//! Decision engine: scoring, per-leg decisions and the rotation strategy
//! that ties them to a broker.

mod decision;
mod rotation;
mod scoring;
pub mod trace;
mod traits;

pub use decision::{LegAction, PositionState, SkipReason};
pub use rotation::RotationStrategy;
pub use scoring::{compute_scores, observe, select_best, PriceObservation, ScoredAsset, SelectionMode};
pub use traits::{Strategy, StrategyHandle};
