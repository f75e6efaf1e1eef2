// =============================================================================
// Series Sanitizer
// =============================================================================
//
// History APIs occasionally return rows out of order, with duplicate
// timestamps, or with missing / non-numeric fields. Everything downstream
// (EMA, ATR, trend) assumes a clean ascending, time-unique series, so all
// raw candle data passes through here first.
//
// Contract:
//   1. Drop any record whose time or close is missing or non-finite.
//   2. Sort ascending by time.
//   3. On duplicate times, keep the first occurrence (post-sort).
//
// Pure and deterministic: the same input multiset always yields the same
// output sequence.

use crate::market_data::{Candle, RawCandle};

/// Sanitize a raw candle sequence into a clean ascending, time-unique series.
///
/// Missing open/high/low/volume on an otherwise valid record default to the
/// close price (and 0.0 volume) so a close-only feed still produces a usable
/// series; non-finite values in those fields are dropped the same way.
pub fn sanitize_candles(raw: &[RawCandle]) -> Vec<Candle> {
    let mut cleaned: Vec<Candle> = raw
        .iter()
        .filter_map(|r| {
            let time = r.time.filter(|t| *t > 0)?;
            let close = r.close.filter(|c| c.is_finite())?;
            let open = r.open.filter(|v| v.is_finite()).unwrap_or(close);
            let high = r.high.filter(|v| v.is_finite()).unwrap_or(close);
            let low = r.low.filter(|v| v.is_finite()).unwrap_or(close);
            let volume = r
                .volume
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(0.0);
            Some(Candle {
                time,
                open,
                high,
                low,
                close,
                volume,
            })
        })
        .collect();

    // Stable sort keeps input order among equal times, so "first occurrence
    // wins" below means first in the original sequence.
    cleaned.sort_by_key(|c| c.time);
    cleaned.dedup_by_key(|c| c.time);
    cleaned
}
