// =============================================================================
// Trend Classifier
// =============================================================================
//
// Combines EMA(short), EMA(long), and the last close into a three-state trend
// label per timeframe. Two classification rules exist in production configs,
// so the rule is a pluggable policy rather than hardcoded:
//
//   StrictNesting (default, conservative — prefers false negatives):
//     BULLISH iff ltp > emaShort AND emaShort > emaLong
//     BEARISH iff ltp < emaShort AND emaShort < emaLong
//
//   PriceVsEmas (price against both averages, EMA ordering ignored):
//     BULLISH iff ltp > emaShort AND ltp > emaLong
//     BEARISH iff ltp < emaShort AND ltp < emaLong
//
// Anything else — insufficient data, a non-finite value — is NEUTRAL.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::indicators::ema::latest_ema;
use crate::market_data::Candle;
use crate::types::TrendLabel;

/// Which trend classification rule to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendRule {
    StrictNesting,
    PriceVsEmas,
}

impl Default for TrendRule {
    fn default() -> Self {
        Self::StrictNesting
    }
}

/// EMA periods feeding the classifier. `superlong` is an optional third
/// horizon published alongside the others but not used by either rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrendPeriods {
    pub short: usize,
    pub long: usize,
    #[serde(default)]
    pub superlong: Option<usize>,
}

impl Default for TrendPeriods {
    fn default() -> Self {
        Self {
            short: 20,
            long: 50,
            superlong: None,
        }
    }
}

/// The classifier's full output for one (symbol, timeframe) evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSnapshot {
    pub label: TrendLabel,
    pub ema_short: Option<f64>,
    pub ema_long: Option<f64>,
    pub ema_superlong: Option<f64>,
    pub ltp: Option<f64>,
}

impl TrendSnapshot {
    fn neutral() -> Self {
        Self {
            label: TrendLabel::Neutral,
            ema_short: None,
            ema_long: None,
            ema_superlong: None,
            ltp: None,
        }
    }
}

/// Classify the trend of a sanitized candle series.
///
/// Requires `candles.len() >= periods.long`; shorter series classify as
/// NEUTRAL with no EMA values.
pub fn classify(candles: &[Candle], periods: TrendPeriods, rule: TrendRule) -> TrendSnapshot {
    if candles.len() < periods.long {
        debug!(
            have = candles.len(),
            need = periods.long,
            "trend: insufficient data"
        );
        return TrendSnapshot::neutral();
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let ema_short = latest_ema(&closes, periods.short);
    let ema_long = latest_ema(&closes, periods.long);
    let ema_superlong = periods.superlong.and_then(|p| latest_ema(&closes, p));
    let ltp = closes.last().copied();

    let (es, el, price) = match (ema_short, ema_long, ltp) {
        (Some(es), Some(el), Some(p)) if es.is_finite() && el.is_finite() && p.is_finite() => {
            (es, el, p)
        }
        _ => {
            return TrendSnapshot {
                ema_superlong,
                ..TrendSnapshot::neutral()
            }
        }
    };

    let label = match rule {
        TrendRule::StrictNesting => {
            if price > es && es > el {
                TrendLabel::Bullish
            } else if price < es && es < el {
                TrendLabel::Bearish
            } else {
                TrendLabel::Neutral
            }
        }
        TrendRule::PriceVsEmas => {
            if price > es && price > el {
                TrendLabel::Bullish
            } else if price < es && price < el {
                TrendLabel::Bearish
            } else {
                TrendLabel::Neutral
            }
        }
    };

    TrendSnapshot {
        label,
        ema_short: Some(es),
        ema_long: Some(el),
        ema_superlong,
        ltp: Some(price),
    }
}

/// Classify from precomputed values — the fast path the decision engines use
/// when the EMAs are already cached.
pub fn classify_values(ltp: f64, ema_short: f64, ema_long: f64, rule: TrendRule) -> TrendLabel {
    if !ltp.is_finite() || !ema_short.is_finite() || !ema_long.is_finite() {
        return TrendLabel::Neutral;
    }
    match rule {
        TrendRule::StrictNesting => {
            if ltp > ema_short && ema_short > ema_long {
                TrendLabel::Bullish
            } else if ltp < ema_short && ema_short < ema_long {
                TrendLabel::Bearish
            } else {
                TrendLabel::Neutral
            }
        }
        TrendRule::PriceVsEmas => {
            if ltp > ema_short && ltp > ema_long {
                TrendLabel::Bullish
            } else if ltp < ema_short && ltp < ema_long {
                TrendLabel::Bearish
            } else {
                TrendLabel::Neutral
            }
        }
    }
}
