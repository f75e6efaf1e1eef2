// =============================================================================
// Live State & Snapshot Stores
// =============================================================================
//
// LiveStore holds the most recently observed ticker fields per symbol,
// coalesced: a field missing from a new tick never erases a previously known
// value (last-known-good wins).
//
// SnapshotStore holds exactly one copy of each symbol's LiveState, replaced
// on every snapshot-timer tick. That copy represents the state at
// "now - window" and is the baseline the rate-of-change engine measures
// against.
//
// Both stores are keyed by symbol with independent entries; readers may see a
// stale-but-consistent value, which is acceptable.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::market_data::Tick;

/// Coalesced last-known-good ticker fields for one symbol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveState {
    pub last_price: Option<f64>,
    pub open_interest: Option<f64>,
    pub volume: Option<f64>,
    /// Milliseconds since the UNIX epoch of the most recent tick applied.
    pub timestamp_ms: i64,
}

impl LiveState {
    /// Merge a tick into this state. Present, finite fields overwrite;
    /// missing or non-finite fields leave the previous value in place.
    pub fn apply(&mut self, tick: &Tick) {
        if let Some(p) = tick.last_price.filter(|v| v.is_finite()) {
            self.last_price = Some(p);
        }
        if let Some(oi) = tick.open_interest.filter(|v| v.is_finite()) {
            self.open_interest = Some(oi);
        }
        if let Some(v) = tick.volume.filter(|v| v.is_finite()) {
            self.volume = Some(v);
        }
        self.timestamp_ms = tick.timestamp_ms;
    }
}

/// Per-symbol store of coalesced live ticker state.
#[derive(Default)]
pub struct LiveStore {
    states: RwLock<HashMap<String, LiveState>>,
}

impl LiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a tick and return the resulting coalesced state.
    pub fn apply_tick(&self, tick: &Tick) -> LiveState {
        let mut map = self.states.write();
        let entry = map.entry(tick.symbol.clone()).or_default();
        entry.apply(tick);
        entry.clone()
    }

    pub fn get(&self, symbol: &str) -> Option<LiveState> {
        self.states.read().get(symbol).cloned()
    }

    /// Clone the full map — used by the snapshot timer.
    pub fn all(&self) -> HashMap<String, LiveState> {
        self.states.read().clone()
    }
}

/// Per-symbol store of the single retained periodic snapshot.
#[derive(Default)]
pub struct SnapshotStore {
    snapshots: RwLock<HashMap<String, LiveState>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every symbol's snapshot with its current live state. Symbols
    /// with no live data yet simply have no snapshot.
    pub fn capture(&self, live: &LiveStore) {
        let current = live.all();
        debug!(symbols = current.len(), "capturing periodic snapshot");
        let mut map = self.snapshots.write();
        for (symbol, state) in current {
            map.insert(symbol, state);
        }
    }

    pub fn get(&self, symbol: &str) -> Option<LiveState> {
        self.snapshots.read().get(symbol).cloned()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn tick(symbol: &str, price: Option<f64>, oi: Option<f64>, vol: Option<f64>) -> Tick {
        Tick {
            symbol: symbol.to_string(),
            last_price: price,
            open_interest: oi,
            volume: vol,
            timestamp_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn coalescing_retains_last_known_good() {
        let store = LiveStore::new();
        store.apply_tick(&tick("BTCUSD", Some(50_000.0), Some(1_000.0), Some(10.0)));

        // Next tick only carries a price; OI and volume must survive.
        let state = store.apply_tick(&tick("BTCUSD", Some(50_100.0), None, None));
        assert_eq!(state.last_price, Some(50_100.0));
        assert_eq!(state.open_interest, Some(1_000.0));
        assert_eq!(state.volume, Some(10.0));
    }

    #[test]
    fn non_finite_fields_do_not_overwrite() {
        let store = LiveStore::new();
        store.apply_tick(&tick("BTCUSD", Some(50_000.0), Some(1_000.0), None));
        let state = store.apply_tick(&tick("BTCUSD", Some(f64::NAN), Some(f64::INFINITY), None));
        assert_eq!(state.last_price, Some(50_000.0));
        assert_eq!(state.open_interest, Some(1_000.0));
    }

    #[test]
    fn symbols_are_independent() {
        let store = LiveStore::new();
        store.apply_tick(&tick("BTCUSD", Some(50_000.0), None, None));
        store.apply_tick(&tick("ETHUSD", Some(3_000.0), None, None));
        assert_eq!(store.get("BTCUSD").unwrap().last_price, Some(50_000.0));
        assert_eq!(store.get("ETHUSD").unwrap().last_price, Some(3_000.0));
        assert!(store.get("SOLUSD").is_none());
    }

    #[test]
    fn snapshot_replaces_previous() {
        let live = LiveStore::new();
        let snaps = SnapshotStore::new();

        live.apply_tick(&tick("BTCUSD", Some(100.0), Some(500.0), Some(1.0)));
        snaps.capture(&live);
        assert_eq!(snaps.get("BTCUSD").unwrap().last_price, Some(100.0));

        live.apply_tick(&tick("BTCUSD", Some(105.0), None, None));
        snaps.capture(&live);
        // Exactly one snapshot retained, and it's the newer one.
        assert_eq!(snaps.get("BTCUSD").unwrap().last_price, Some(105.0));
    }

    #[test]
    fn snapshot_is_a_copy_not_a_reference() {
        let live = LiveStore::new();
        let snaps = SnapshotStore::new();

        live.apply_tick(&tick("BTCUSD", Some(100.0), None, None));
        snaps.capture(&live);
        live.apply_tick(&tick("BTCUSD", Some(200.0), None, None));

        // The snapshot must still reflect the state at capture time.
        assert_eq!(snaps.get("BTCUSD").unwrap().last_price, Some(100.0));
        assert_eq!(live.get("BTCUSD").unwrap().last_price, Some(200.0));
    }

    #[test]
    fn no_snapshot_before_first_capture() {
        let snaps = SnapshotStore::new();
        assert!(snaps.get("BTCUSD").is_none());
    }
}
