// =============================================================================
// Market Data Feed — history REST client and live ticker stream
// =============================================================================

pub mod history;
pub mod ticker;

use serde::Serialize;

pub use history::HistoryClient;

/// Connection state of one symbol's ticker stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnState {
    Disconnected,
    Connecting,
    Connected,
}
