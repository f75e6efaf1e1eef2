// =============================================================================
// Average True Range (ATR) — Wilder's Smoothing Method
// =============================================================================
//
// ATR measures volatility by decomposing the entire range of a bar.
//
// True Range for each bar:
//   TR = max(H - L, |H - prevClose|, |L - prevClose|)
//
// ATR is then the smoothed average of TR using Wilder's method:
//   ATR_0 = SMA of first `period` TR values
//   ATR_t = (ATR_{t-1} * (period - 1) + TR_t) / period
//
// A step with any non-finite input is skipped (not fatal); the series simply
// has one fewer TR value. Default period: 14.
// =============================================================================

use crate::market_data::Candle;

/// Full ATR computation result: the complete smoothed sequence plus its last
/// value, for callers that smooth the sequence further (e.g. an EMA over it).
#[derive(Debug, Clone)]
pub struct AtrResult {
    pub last: f64,
    pub series: Vec<f64>,
}

/// Compute the Wilder-smoothed ATR sequence over `candles`.
///
/// Returns `None` when:
/// - `period` is zero,
/// - there are fewer than `period + 1` candles, or
/// - fewer than `period` valid TR steps remain after skipping non-finite
///   inputs.
pub fn atr_series(candles: &[Candle], period: usize) -> Option<AtrResult> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let mut tr_values: Vec<f64> = Vec::with_capacity(candles.len() - 1);
    for pair in candles.windows(2) {
        let high = pair[1].high;
        let low = pair[1].low;
        let prev_close = pair[0].close;
        if !high.is_finite() || !low.is_finite() || !prev_close.is_finite() {
            continue;
        }
        let hl = high - low;
        let hc = (high - prev_close).abs();
        let lc = (low - prev_close).abs();
        tr_values.push(hl.max(hc).max(lc));
    }

    if tr_values.len() < period {
        return None;
    }

    let seed: f64 = tr_values[..period].iter().sum::<f64>() / period as f64;
    if !seed.is_finite() {
        return None;
    }

    let period_f = period as f64;
    let mut atr = seed;
    let mut series = Vec::with_capacity(tr_values.len() - period + 1);
    series.push(seed);
    for &tr in &tr_values[period..] {
        atr = (atr * (period_f - 1.0) + tr) / period_f;
        if !atr.is_finite() {
            return None;
        }
        series.push(atr);
    }

    Some(AtrResult { last: atr, series })
}

/// The most recent ATR value only.
pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<f64> {
    atr_series(candles, period).map(|r| r.last)
}

/// ATR as a percentage of the most recent close.
///
/// Useful for comparing volatility across instruments with different price
/// scales; the volatility gates work in these units.
pub fn atr_pct(candles: &[Candle], period: usize) -> Option<f64> {
    let atr = calculate_atr(candles, period)?;
    let last_close = candles.last()?.close;
    if last_close <= 0.0 {
        return None;
    }
    Some((atr / last_close) * 100.0)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            time: 0,
            open,
            high,
            low,
            close,
            volume: 100.0,
        }
    }

    #[test]
    fn atr_period_zero() {
        let candles = vec![candle(100.0, 105.0, 95.0, 102.0); 20];
        assert!(atr_series(&candles, 0).is_none());
    }

    #[test]
    fn atr_insufficient_data() {
        // Need period + 1 = 15 candles for period=14, only have 10.
        let candles = vec![candle(100.0, 105.0, 95.0, 102.0); 10];
        assert!(calculate_atr(&candles, 14).is_none());
    }

    #[test]
    fn atr_zero_true_range_converges_to_zero() {
        // high == low == close on every bar: TR is 0 everywhere, so ATR is 0.
        let candles: Vec<Candle> = (0..40).map(|_| candle(50.0, 50.0, 50.0, 50.0)).collect();
        let atr = calculate_atr(&candles, 14).unwrap();
        assert!(atr.abs() < 1e-12, "expected 0 ATR, got {atr}");
    }

    #[test]
    fn atr_constant_range() {
        // Every bar spans 10 with close at the midpoint: ATR stays near 10.
        let mut candles = Vec::new();
        for i in 0..30 {
            let base = 100.0 + i as f64 * 0.1;
            candles.push(candle(base, base + 5.0, base - 5.0, base));
        }
        let atr = calculate_atr(&candles, 14).unwrap();
        assert!((atr - 10.0).abs() < 1.0, "expected ATR near 10.0, got {atr}");
    }

    #[test]
    fn atr_true_range_uses_prev_close() {
        // Gap scenario: |H - prevClose| > H - L.
        let candles = vec![
            candle(100.0, 105.0, 95.0, 95.0),
            candle(110.0, 115.0, 108.0, 112.0), // |115-95|=20 > 115-108=7
            candle(112.0, 118.0, 110.0, 115.0),
            candle(115.0, 120.0, 113.0, 118.0),
        ];
        let atr = calculate_atr(&candles, 3).unwrap();
        assert!(atr > 7.0, "ATR should reflect the gap, got {atr}");
    }

    #[test]
    fn atr_skips_non_finite_steps() {
        // One poisoned bar invalidates two TR steps but not the whole series.
        let mut candles: Vec<Candle> = (0..20)
            .map(|i| {
                let base = 100.0 + i as f64;
                candle(base, base + 2.0, base - 2.0, base)
            })
            .collect();
        candles[5].high = f64::NAN;
        let atr = calculate_atr(&candles, 5);
        assert!(atr.is_some());
        assert!(atr.unwrap().is_finite());
    }

    #[test]
    fn atr_too_few_valid_steps_is_none() {
        // 5 candles gives 4 TR steps; poisoning one leaves 2 valid pairs
        // (the bad bar breaks both adjacent steps), below period=3.
        let mut candles: Vec<Candle> = (0..5)
            .map(|i| {
                let base = 100.0 + i as f64;
                candle(base, base + 2.0, base - 2.0, base)
            })
            .collect();
        candles[2].high = f64::NAN;
        candles[2].close = f64::NAN;
        assert!(calculate_atr(&candles, 3).is_none());
    }

    #[test]
    fn atr_series_seed_is_sma_of_first_trs() {
        let candles: Vec<Candle> = (0..10)
            .map(|i| {
                let base = 100.0 + i as f64;
                candle(base, base + 4.0, base - 4.0, base)
            })
            .collect();
        let result = atr_series(&candles, 3).unwrap();
        // Constant TR of 8+1 drift => first three TRs equal, seed == TR.
        assert_eq!(result.series.len(), 10 - 1 - 3 + 1);
        assert!((result.series[0] - result.series[1]).abs() < 1.0);
        assert!((result.last - result.series.last().unwrap()).abs() < 1e-12);
    }

    #[test]
    fn atr_pct_scales_by_last_close() {
        let candles: Vec<Candle> = (0..30)
            .map(|i| {
                let base = 100.0 + i as f64;
                candle(base, base + 3.0, base - 3.0, base + 1.0)
            })
            .collect();
        let pct = atr_pct(&candles, 14).unwrap();
        let abs = calculate_atr(&candles, 14).unwrap();
        let last_close = candles.last().unwrap().close;
        assert!((pct - abs / last_close * 100.0).abs() < 1e-10);
    }

    #[test]
    fn atr_pct_zero_close_is_none() {
        let mut candles: Vec<Candle> = (0..20)
            .map(|i| {
                let base = 100.0 + i as f64;
                candle(base, base + 3.0, base - 3.0, base)
            })
            .collect();
        candles.last_mut().unwrap().close = 0.0;
        assert!(atr_pct(&candles, 5).is_none());
    }
}
