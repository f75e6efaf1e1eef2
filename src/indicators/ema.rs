// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent values, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = value_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The first EMA value is seeded with the SMA of the first `period` inputs and
// sits at output index `period - 1`; every earlier index is `None`.
//
// The input is just a numeric series — closes, an ATR sequence, anything —
// so the same engine smooths derived series too.
// =============================================================================

/// Compute the EMA series for `values` with look-back `period`, aligned to
/// the input: output has the same length, with `None` before index
/// `period - 1`.
///
/// # Edge cases
/// - `period == 0` => all-`None` (division-by-zero guard)
/// - `values.len() < period` => all-`None` (insufficient data, not an error)
/// - A non-finite input or intermediate value stops the series; trailing
///   entries stay `None`.
pub fn ema_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);

    // Seed: SMA of the first `period` values.
    let sma: f64 = values[..period].iter().sum::<f64>() / period as f64;
    if !sma.is_finite() {
        return out;
    }
    out[period - 1] = Some(sma);

    let mut prev = sma;
    for i in period..values.len() {
        let ema = values[i] * multiplier + prev * (1.0 - multiplier);
        if !ema.is_finite() {
            // Downstream consumers should not trust a broken series.
            break;
        }
        out[i] = Some(ema);
        prev = ema;
    }

    out
}

/// The most recent EMA value, or `None` on insufficient/broken data.
pub fn latest_ema(values: &[f64], period: usize) -> Option<f64> {
    ema_series(values, period).into_iter().flatten().last()
}
