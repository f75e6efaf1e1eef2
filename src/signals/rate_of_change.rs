// =============================================================================
// Rate-of-Change Decision Engine
// =============================================================================
//
// Classifies the move between the periodic snapshot (state at "now - window")
// and the current live state into one of four quadrants of price/OI
// direction:
//
//   price > +gate, OI > +gate  => LONG BUILDUP   (requires volume confirm)
//   price > +gate, OI < -gate  => SHORT COVERING
//   price < -gate, OI > +gate  => SHORT BUILDUP  (requires volume confirm)
//   price < -gate, OI < -gate  => LONG UNWINDING
//   otherwise                  => IGNORE
//
// Gates are percentage thresholds, either fixed or scaled by recent
// ATR-derived volatility (clamped multiplier), so signals fire more readily
// in calm markets and less readily in turbulent ones.
//
// Bearish-leaning outcomes (SHORT BUILDUP, LONG UNWINDING) optionally pass a
// dual confirmation gate: persistence across recent evaluations AND a broken
// microstructure on the fast timeframe. Failing either downgrades to IGNORE.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::live_state::LiveState;
use crate::signals::persistence::PersistenceWindow;
use crate::types::{Signal, SignalKind};

/// Percentage gates for the quadrant classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GateConfig {
    /// Price move gate in percent (e.g. 0.04 = 0.04 %).
    pub price_gate_pct: f64,
    /// Open-interest move gate in percent.
    pub oi_gate_pct: f64,
    /// When true, both gates scale with recent ATR%-of-price volatility.
    pub adaptive: bool,
    /// ATR%-of-price considered "normal"; the adaptive multiplier is the
    /// ratio of current to baseline, clamped below.
    pub baseline_atr_pct: f64,
    pub multiplier_min: f64,
    pub multiplier_max: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            price_gate_pct: 0.04,
            oi_gate_pct: 0.05,
            adaptive: false,
            baseline_atr_pct: 0.05,
            multiplier_min: 0.6,
            multiplier_max: 1.4,
        }
    }
}

impl GateConfig {
    /// Resolve the effective (price, oi) gates for the current volatility.
    ///
    /// With adaptive gating off, or no ATR reading available, the fixed
    /// thresholds apply unchanged.
    pub fn effective_gates(&self, atr_pct: Option<f64>) -> (f64, f64) {
        if !self.adaptive {
            return (self.price_gate_pct, self.oi_gate_pct);
        }
        match atr_pct.filter(|v| v.is_finite() && *v > 0.0) {
            Some(vol) if self.baseline_atr_pct > 0.0 => {
                let m = (vol / self.baseline_atr_pct)
                    .clamp(self.multiplier_min, self.multiplier_max);
                (self.price_gate_pct * m, self.oi_gate_pct * m)
            }
            _ => (self.price_gate_pct, self.oi_gate_pct),
        }
    }
}

/// Output of one rate-of-change evaluation: the signal plus the measured
/// deltas that produced it (also published to subscribers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocEvaluation {
    pub signal: Signal,
    pub price_change_pct: Option<f64>,
    pub oi_change_pct: Option<f64>,
    pub volume_confirmed: bool,
}

/// Percentage change from `base` to `current`, guarded on a positive base.
fn pct_change(current: Option<f64>, base: Option<f64>) -> Option<f64> {
    let current = current.filter(|v| v.is_finite())?;
    let base = base.filter(|v| v.is_finite() && *v > 0.0)?;
    Some((current - base) / base * 100.0)
}

/// Evaluate the live-vs-snapshot move for one symbol.
///
/// `strict_volume` selects the confirmation policy: strictly-up required
/// when true, flat-or-up counts when false (the documented default).
pub fn evaluate(
    live: &LiveState,
    snapshot: &LiveState,
    gates: (f64, f64),
    strict_volume: bool,
) -> RocEvaluation {
    let price_change_pct = pct_change(live.last_price, snapshot.last_price);
    let oi_change_pct = pct_change(live.open_interest, snapshot.open_interest);

    let volume_confirmed = match (live.volume, snapshot.volume) {
        (Some(cur), Some(base)) if cur.is_finite() && base.is_finite() && base > 0.0 => {
            if strict_volume {
                cur > base
            } else {
                cur >= base
            }
        }
        _ => false,
    };

    let (price_gate, oi_gate) = gates;

    let (pc, oc) = match (price_change_pct, oi_change_pct) {
        (Some(pc), Some(oc)) => (pc, oc),
        _ => {
            return RocEvaluation {
                signal: Signal::ignore("snapshot-baseline-missing"),
                price_change_pct,
                oi_change_pct,
                volume_confirmed,
            }
        }
    };

    let price_up = pc > price_gate;
    let price_down = pc < -price_gate;
    let oi_up = oc > oi_gate;
    let oi_down = oc < -oi_gate;

    let reason = format!("price {pc:+.3}% / oi {oc:+.3}% over window");
    let signal = match (price_up, price_down, oi_up, oi_down) {
        (true, _, true, _) => {
            if volume_confirmed {
                Signal::new(SignalKind::LongBuildup, reason, true)
            } else {
                Signal::ignore("long-buildup unconfirmed by volume")
            }
        }
        (true, _, _, true) => Signal::new(SignalKind::ShortCovering, reason, volume_confirmed),
        (_, true, true, _) => {
            if volume_confirmed {
                Signal::new(SignalKind::ShortBuildup, reason, true)
            } else {
                Signal::ignore("short-buildup unconfirmed by volume")
            }
        }
        (_, true, _, true) => Signal::new(SignalKind::LongUnwinding, reason, volume_confirmed),
        _ => Signal::ignore("inside-gates"),
    };

    debug!(
        price_change = ?price_change_pct,
        oi_change = ?oi_change_pct,
        volume_confirmed,
        kind = %signal.kind,
        "rate-of-change evaluation"
    );

    RocEvaluation {
        signal,
        price_change_pct,
        oi_change_pct,
        volume_confirmed,
    }
}

/// Broken-microstructure check on the fast timeframe: price below its short
/// EMA which itself sits at or below the long EMA.
pub fn microstructure_broken(ltp: f64, ema_short: f64, ema_long: f64) -> bool {
    ltp.is_finite()
        && ema_short.is_finite()
        && ema_long.is_finite()
        && ltp < ema_short
        && ema_short <= ema_long
}

/// Apply the dual confirmation gate to a bearish-leaning signal: require
/// BOTH persistence (same classification in >= 1 of the last 2 evaluations)
/// AND a broken fast-timeframe microstructure. Either failing downgrades the
/// signal to IGNORE. Non-bearish signals pass through untouched.
pub fn confirm_bearish(
    signal: Signal,
    window: &PersistenceWindow,
    microstructure_broken: bool,
) -> Signal {
    if !signal.kind.is_bearish_leaning() {
        return signal;
    }
    if !window.recently_observed(signal.kind) {
        return Signal::ignore(format!("{} lacks persistence", signal.kind));
    }
    if !microstructure_broken {
        return Signal::ignore(format!("{} lacks structural confirmation", signal.kind));
    }
    signal
}
