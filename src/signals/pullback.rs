// =============================================================================
// Pullback-Within-Trend Strategies
// =============================================================================
//
// Combines the trend classification with RSI zones, behind a minimum
// ATR-as-percent-of-price volatility floor. Two named entry policies exist in
// deployed configs and both are selectable:
//
//   ThresholdCross — BULLISH trend + RSI <= lower  => LONG
//                    BEARISH trend + RSI >= upper  => SHORT
//
//   BandedPullback — BULLISH trend + long_min < RSI < long_max   => LONG
//                    BEARISH trend + short_min < RSI < short_max => SHORT
//
// Everything else is NO TRADE with a reason naming the failed gate.

use serde::{Deserialize, Serialize};

use crate::types::{Signal, SignalKind, TrendLabel};

/// RSI entry policy, selectable per strategy instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RsiEntryPolicy {
    ThresholdCross {
        upper: f64,
        lower: f64,
    },
    BandedPullback {
        long_min: f64,
        long_max: f64,
        short_min: f64,
        short_max: f64,
    },
}

impl Default for RsiEntryPolicy {
    fn default() -> Self {
        Self::ThresholdCross {
            upper: 65.0,
            lower: 35.0,
        }
    }
}

/// Parameters for one pullback strategy instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PullbackParams {
    #[serde(flatten)]
    pub policy: RsiEntryPolicy,
    /// Minimum ATR as a percent of price for the strategy to engage at all.
    pub min_atr_pct: f64,
}

impl Default for PullbackParams {
    fn default() -> Self {
        Self {
            policy: RsiEntryPolicy::default(),
            min_atr_pct: 0.03,
        }
    }
}

/// Evaluate a pullback entry from the cached indicator values.
pub fn decide(
    trend: TrendLabel,
    rsi: Option<f64>,
    atr_pct: Option<f64>,
    params: &PullbackParams,
) -> Signal {
    if trend == TrendLabel::Neutral {
        return Signal::no_trade("trend-neutral");
    }

    let vol = atr_pct.filter(|v| v.is_finite()).unwrap_or(0.0);
    if vol < params.min_atr_pct {
        return Signal::no_trade("low-vol");
    }

    let rsi = match rsi.filter(|v| v.is_finite()) {
        Some(v) => v,
        None => return Signal::no_trade("rsi-missing"),
    };

    let in_long_zone = match params.policy {
        RsiEntryPolicy::ThresholdCross { lower, .. } => rsi <= lower,
        RsiEntryPolicy::BandedPullback {
            long_min, long_max, ..
        } => rsi > long_min && rsi < long_max,
    };
    let in_short_zone = match params.policy {
        RsiEntryPolicy::ThresholdCross { upper, .. } => rsi >= upper,
        RsiEntryPolicy::BandedPullback {
            short_min,
            short_max,
            ..
        } => rsi > short_min && rsi < short_max,
    };

    match trend {
        TrendLabel::Bullish if in_long_zone => {
            Signal::new(SignalKind::Long, format!("rsi={rsi:.2}"), false)
        }
        TrendLabel::Bearish if in_short_zone => {
            Signal::new(SignalKind::Short, format!("rsi={rsi:.2}"), false)
        }
        _ => Signal::no_trade("rsi-not-in-zone"),
    }
}
