// =============================================================================
// Signal Decision Engines
// =============================================================================
//
// rate_of_change — quadrant price/OI classification against the periodic
//                  snapshot, with fixed or volatility-adaptive gates.
// pullback       — trend + RSI-zone entry strategies (two named variants).
// persistence    — bounded directional window damping single-tick noise.
// latch          — optional 3-state master-signal wrapper with explicit exits.

pub mod latch;
pub mod persistence;
pub mod pullback;
pub mod rate_of_change;

pub use latch::MasterLatch;
pub use persistence::PersistenceWindow;
pub use pullback::{PullbackParams, RsiEntryPolicy};
pub use rate_of_change::{GateConfig, RocEvaluation};
