// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes on a bounded
// [0, 100] scale.
//
// Step 1 — successive close-to-close deltas.
// Step 2 — seed average gain / loss with the SMA of the first `period` deltas.
// Step 3 — Wilder smoothing:
//            avg_gain = (avg_gain * (period - 1) + gain) / period
//            avg_loss = (avg_loss * (period - 1) + loss) / period
// Step 4 — RS = avg_gain / avg_loss,  RSI = 100 - 100 / (1 + RS)
//
// avg_loss is floored at a small epsilon so an all-gains series yields
// RS -> huge, RSI -> 100 instead of a division by zero. That floor is a
// numeric-stability policy, not an error condition.
// =============================================================================

/// Divisor floor for the average loss.
const LOSS_EPSILON: f64 = 1e-10;

/// Compute the most recent RSI value for `closes` with look-back `period`.
///
/// Returns `None` when `period` is zero, there are fewer than `period + 1`
/// closes, or the computation produces a non-finite value.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let (sum_gain, sum_loss) = deltas[..period]
        .iter()
        .fold((0.0_f64, 0.0_f64), |(g, l), &d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l + d.abs())
            }
        });

    let period_f = period as f64;
    let mut avg_gain = sum_gain / period_f;
    let mut avg_loss = sum_loss / period_f;

    for &delta in &deltas[period..] {
        let gain = if delta > 0.0 { delta } else { 0.0 };
        let loss = if delta < 0.0 { delta.abs() } else { 0.0 };
        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;
    }

    let rs = avg_gain / avg_loss.max(LOSS_EPSILON);
    let value = 100.0 - 100.0 / (1.0 + rs);

    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}
