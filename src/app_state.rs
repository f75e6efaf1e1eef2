// =============================================================================
// Central Application State — Vertex Signal Engine
// =============================================================================
//
// The single source of truth for the engine. All async tasks hold an
// `Arc<AppState>`; it ties the stores together and builds the status snapshot
// served over REST.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for all mutable shared collections.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::audit::AuditLog;
use crate::events::EventBus;
use crate::feed::ConnState;
use crate::live_state::{LiveState, LiveStore, SnapshotStore};
use crate::runtime_config::RuntimeConfig;
use crate::signals::{MasterLatch, PersistenceWindow, RocEvaluation};
use crate::trend::TrendSnapshot;

/// Maximum number of recent errors to retain for the status endpoint.
const MAX_RECENT_ERRORS: usize = 50;

// =============================================================================
// Indicator state
// =============================================================================

/// Cached indicator outputs for one (symbol, timeframe), refreshed on every
/// sweep and read by the decision engines between sweeps.
#[derive(Debug, Clone, Serialize)]
pub struct TimeframeState {
    pub trend: TrendSnapshot,
    pub atr: Option<f64>,
    pub atr_ema: Option<f64>,
    /// ATR as a percent of the last close.
    pub atr_pct: Option<f64>,
    pub rsi: Option<f64>,
    /// Number of sanitized candles that fed this evaluation.
    pub candle_count: usize,
    /// Milliseconds since the UNIX epoch when this state was computed.
    pub updated_ms: i64,
}

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// AppState
// =============================================================================

/// Central application state shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    /// Monotonically increasing version counter, incremented on every
    /// meaningful state mutation.
    pub state_version: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    pub runtime_config: RwLock<RuntimeConfig>,

    // ── Live market data ────────────────────────────────────────────────
    pub live: LiveStore,
    pub snapshots: SnapshotStore,

    // ── Indicator cache: symbol -> timeframe label -> state ─────────────
    pub indicator_state: RwLock<HashMap<String, HashMap<String, TimeframeState>>>,

    // ── Decision-engine state per symbol ────────────────────────────────
    pub persistence: RwLock<HashMap<String, PersistenceWindow>>,
    pub latches: RwLock<HashMap<String, MasterLatch>>,
    /// Most recent confirmed rate-of-change evaluation per symbol, carried
    /// into the audit row of the next pullback evaluation.
    pub last_roc: RwLock<HashMap<String, RocEvaluation>>,

    // ── Output ──────────────────────────────────────────────────────────
    pub events: EventBus,
    pub audit: AuditLog,

    // ── Feed status per symbol ──────────────────────────────────────────
    pub feed_state: RwLock<HashMap<String, ConnState>>,

    // ── Error log ───────────────────────────────────────────────────────
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    /// Instant when the engine was started. Used for uptime calculations.
    pub start_time: Instant,
}

impl AppState {
    /// Construct a new `AppState` from the given runtime configuration. The
    /// returned value is typically wrapped in `Arc` immediately.
    pub fn new(config: RuntimeConfig) -> Self {
        let audit = AuditLog::new(config.audit_log_path.clone());

        let mut feed_state = HashMap::new();
        for symbol in &config.symbols {
            feed_state.insert(symbol.clone(), ConnState::Disconnected);
        }

        Self {
            state_version: AtomicU64::new(1),
            runtime_config: RwLock::new(config),
            live: LiveStore::new(),
            snapshots: SnapshotStore::new(),
            indicator_state: RwLock::new(HashMap::new()),
            persistence: RwLock::new(HashMap::new()),
            latches: RwLock::new(HashMap::new()),
            last_roc: RwLock::new(HashMap::new()),
            events: EventBus::default(),
            audit,
            feed_state: RwLock::new(feed_state),
            recent_errors: RwLock::new(Vec::new()),
            start_time: Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    /// Atomically increment the state version after a meaningful mutation.
    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Indicator cache ─────────────────────────────────────────────────

    /// Store a freshly computed timeframe state.
    pub fn set_timeframe_state(&self, symbol: &str, timeframe: &str, state: TimeframeState) {
        self.indicator_state
            .write()
            .entry(symbol.to_string())
            .or_default()
            .insert(timeframe.to_string(), state);
        self.increment_version();
    }

    pub fn timeframe_state(&self, symbol: &str, timeframe: &str) -> Option<TimeframeState> {
        self.indicator_state
            .read()
            .get(symbol)
            .and_then(|m| m.get(timeframe))
            .cloned()
    }

    // ── Feed status ─────────────────────────────────────────────────────

    pub fn set_feed_state(&self, symbol: &str, state: ConnState) {
        self.feed_state.write().insert(symbol.to_string(), state);
        self.increment_version();
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error message. The buffer is capped at
    /// [`MAX_RECENT_ERRORS`]; oldest entries are evicted when full.
    pub fn push_error(&self, msg: String) {
        let record = ErrorRecord {
            message: msg,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }

        self.increment_version();
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Build the serialisable status snapshot served by `GET /api/v1/status`.
    pub fn build_status(&self) -> StatusSnapshot {
        let config = self.runtime_config.read();

        let feed: HashMap<String, ConnState> = self.feed_state.read().clone();
        let live: HashMap<String, LiveState> = self.live.all();
        let indicators = self.indicator_state.read().clone();
        let recent_errors = self.recent_errors.read().clone();

        StatusSnapshot {
            state_version: self.current_state_version(),
            server_time: Utc::now().timestamp_millis(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            symbols: config.symbols.clone(),
            ws_clients: self.events.subscriber_count(),
            feed,
            live,
            indicators,
            recent_errors,
        }
    }
}

// =============================================================================
// Serialisable status snapshot
// =============================================================================

/// Engine status payload for the REST status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub uptime_secs: u64,
    pub symbols: Vec<String>,
    pub ws_clients: usize,
    pub feed: HashMap<String, ConnState>,
    pub live: HashMap<String, LiveState>,
    pub indicators: HashMap<String, HashMap<String, TimeframeState>>,
    pub recent_errors: Vec<ErrorRecord>,
}
