// =============================================================================
// Event Bus — typed push events for dashboard clients
// =============================================================================
//
// Every computed value the engine wants clients to see is published as a
// discrete, typed event on a tokio broadcast channel. The websocket handler
// subscribes and forwards each event as one JSON text frame.
//
// Numeric payload policy: prices and indicator values are rounded to 2
// decimal places, ATR to 6. Absent values serialise as JSON null, never NaN.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::types::{SignalKind, TrendLabel};

/// Round to 2 decimal places. Used for prices and most indicator values.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Round to 6 decimal places. Used for ATR, whose magnitude can be far below
/// the price scale.
pub fn round6(v: f64) -> f64 {
    (v * 1_000_000.0).round() / 1_000_000.0
}

fn opt2(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite()).map(round2)
}

fn opt6(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite()).map(round6)
}

// =============================================================================
// Event payloads
// =============================================================================

/// Trend classification for one (symbol, timeframe).
#[derive(Debug, Clone, Serialize)]
pub struct TrendEvent {
    pub symbol: String,
    pub timeframe: String,
    pub trend: TrendLabel,
    pub ltp: Option<f64>,
}

/// EMA pair (and optional super-long EMA) for one (symbol, timeframe).
#[derive(Debug, Clone, Serialize)]
pub struct EmaEvent {
    pub symbol: String,
    pub timeframe: String,
    pub ema_short: Option<f64>,
    pub ema_long: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ema_superlong: Option<f64>,
}

/// ATR reading, both raw and EMA-smoothed, plus ATR as percent of price.
#[derive(Debug, Clone, Serialize)]
pub struct AtrEvent {
    pub symbol: String,
    pub timeframe: String,
    pub atr: Option<f64>,
    pub atr_ema: Option<f64>,
    pub atr_pct: Option<f64>,
}

/// RSI reading for one (symbol, timeframe).
#[derive(Debug, Clone, Serialize)]
pub struct RsiEvent {
    pub symbol: String,
    pub timeframe: String,
    pub rsi: Option<f64>,
}

/// Evaluated signal, from any of the decision engines.
#[derive(Debug, Clone, Serialize)]
pub struct SignalEvent {
    pub symbol: String,
    /// Which engine produced it, e.g. "roc", "pullback", "scalp".
    pub source: String,
    pub kind: SignalKind,
    pub reason: String,
    pub volume_confirmed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_change_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oi_change_pct: Option<f64>,
}

/// Spot price tick for one symbol.
#[derive(Debug, Clone, Serialize)]
pub struct SpotEvent {
    pub symbol: String,
    pub ltp: f64,
}

/// At-the-money strike derived from the spot price.
#[derive(Debug, Clone, Serialize)]
pub struct AtmEvent {
    pub symbol: String,
    pub atm: f64,
}

// =============================================================================
// Event envelope
// =============================================================================

/// One event on the bus. The `kind` tag becomes the discriminator field in
/// the JSON frame.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Trend(TrendEvent),
    Ema(EmaEvent),
    Atr(AtrEvent),
    Rsi(RsiEvent),
    Signal(SignalEvent),
    Spot(SpotEvent),
    Atm(AtmEvent),
}

impl Event {
    pub fn trend(symbol: &str, timeframe: &str, trend: TrendLabel, ltp: Option<f64>) -> Self {
        Self::Trend(TrendEvent {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            trend,
            ltp: opt2(ltp),
        })
    }

    pub fn ema(
        symbol: &str,
        timeframe: &str,
        ema_short: Option<f64>,
        ema_long: Option<f64>,
        ema_superlong: Option<f64>,
    ) -> Self {
        Self::Ema(EmaEvent {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            ema_short: opt2(ema_short),
            ema_long: opt2(ema_long),
            ema_superlong: opt2(ema_superlong),
        })
    }

    pub fn atr(
        symbol: &str,
        timeframe: &str,
        atr: Option<f64>,
        atr_ema: Option<f64>,
        atr_pct: Option<f64>,
    ) -> Self {
        Self::Atr(AtrEvent {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            atr: opt6(atr),
            atr_ema: opt6(atr_ema),
            atr_pct: opt6(atr_pct),
        })
    }

    pub fn rsi(symbol: &str, timeframe: &str, rsi: Option<f64>) -> Self {
        Self::Rsi(RsiEvent {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            rsi: opt2(rsi),
        })
    }

    pub fn spot(symbol: &str, ltp: f64) -> Self {
        Self::Spot(SpotEvent {
            symbol: symbol.to_string(),
            ltp: round2(ltp),
        })
    }

    pub fn atm(symbol: &str, atm: f64) -> Self {
        Self::Atm(AtmEvent {
            symbol: symbol.to_string(),
            atm,
        })
    }
}

// =============================================================================
// EventBus
// =============================================================================

/// Default broadcast channel capacity. Slow subscribers that fall more than
/// this far behind observe a Lagged error and skip ahead.
const CHANNEL_CAPACITY: usize = 256;

/// Broadcast fan-out for engine events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(CHANNEL_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. A send with no subscribers is not an error.
    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
