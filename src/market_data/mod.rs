// =============================================================================
// Market Data Types
// =============================================================================
//
// Candle: a sanitized OHLCV bar keyed by epoch seconds.
// RawCandle: the untrusted vendor record — every field optional so malformed
//            rows deserialize and are dropped by the sanitizer instead of
//            failing the whole fetch.
// Tick: a live ticker update; fields arrive sparsely and are coalesced into
//       LiveState downstream.

pub mod sanitize;

use serde::{Deserialize, Serialize};

/// A single sanitized OHLCV candle (times in epoch seconds, oldest-first in
/// any series).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// An untrusted candle record as returned by the history API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCandle {
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub close: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
}

/// A live ticker update. Any field other than `symbol` may be missing on a
/// given message; last-known-good values are retained by the live store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub last_price: Option<f64>,
    pub open_interest: Option<f64>,
    pub volume: Option<f64>,
    /// Milliseconds since the UNIX epoch.
    pub timestamp_ms: i64,
}
