// =============================================================================
// Latched Master Signal
// =============================================================================
//
// Optional presentation-layer state machine wrapped around the stateless
// decision engine:
//
//   NEUTRAL ──LONG entry──> LONG_ACTIVE ──fast trend turns BEARISH──> NEUTRAL
//   NEUTRAL ──SHORT entry─> SHORT_ACTIVE ──fast trend turns BULLISH──> NEUTRAL
//
// Once latched, the signal holds regardless of the gates that produced the
// entry; only the fast-timeframe trend flipping against the held direction
// releases it, emitting an explicit exit signal. With latching disabled the
// wrapper is bypassed entirely and every evaluation is fresh.

use serde::{Deserialize, Serialize};

use crate::types::{Signal, SignalKind, TrendLabel};

/// Held position of the latched master signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LatchState {
    Neutral,
    LongActive,
    ShortActive,
}

impl Default for LatchState {
    fn default() -> Self {
        Self::Neutral
    }
}

/// Per-symbol latched master signal machine.
#[derive(Debug, Clone, Default)]
pub struct MasterLatch {
    state: LatchState,
}

impl MasterLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LatchState {
        self.state
    }

    /// Advance the machine with a fresh entry evaluation and the current
    /// fast-timeframe trend, returning the signal to present.
    ///
    /// While active, the entry signal is disregarded; the only exit trigger
    /// is the fast trend flipping against the held direction.
    pub fn on_evaluation(&mut self, entry: &Signal, fast_trend: TrendLabel) -> Signal {
        match self.state {
            LatchState::LongActive => {
                if fast_trend == TrendLabel::Bearish {
                    self.state = LatchState::Neutral;
                    Signal::no_trade("exit-long (fast trend flip)")
                } else {
                    Signal::new(SignalKind::Long, "long-active", entry.volume_confirmed)
                }
            }
            LatchState::ShortActive => {
                if fast_trend == TrendLabel::Bullish {
                    self.state = LatchState::Neutral;
                    Signal::no_trade("exit-short (fast trend flip)")
                } else {
                    Signal::new(SignalKind::Short, "short-active", entry.volume_confirmed)
                }
            }
            LatchState::Neutral => {
                match entry.kind {
                    SignalKind::Long => self.state = LatchState::LongActive,
                    SignalKind::Short => self.state = LatchState::ShortActive,
                    _ => {}
                }
                entry.clone()
            }
        }
    }
}
