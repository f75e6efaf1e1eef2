// =============================================================================
// Engine Orchestration
// =============================================================================
//
// Two entry paths drive everything:
//
//   refresh path (every refresh_secs) — fetch candle history for every
//     (symbol, timeframe) concurrently, sanitize, compute indicators and
//     trend, cache the result, publish events, then run the pullback
//     strategies off the cached values.
//
//   tick path (every websocket message) — coalesce into live state, publish
//     spot/ATM, and run the rate-of-change evaluation against the periodic
//     snapshot.
//
// A failed fetch for one timeframe never blocks the others; the previous
// cached state simply stays in place until the next sweep.

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::app_state::{AppState, TimeframeState};
use crate::audit::AuditRow;
use crate::events::Event;
use crate::feed::HistoryClient;
use crate::indicators::atr::{atr_series, AtrResult};
use crate::indicators::ema::latest_ema;
use crate::indicators::rsi::rsi;
use crate::market_data::sanitize::sanitize_candles;
use crate::market_data::{Candle, Tick};
use crate::runtime_config::RuntimeConfig;
use crate::signals::rate_of_change::{confirm_bearish, evaluate, microstructure_broken};
use crate::signals::{pullback, MasterLatch, PersistenceWindow, RocEvaluation};
use crate::trend::{classify, TrendSnapshot};
use crate::types::{Signal, TrendLabel};

// =============================================================================
// Pure computation
// =============================================================================

/// Compute the full indicator state for one timeframe from sanitized candles.
pub fn compute_timeframe_state(candles: &[Candle], cfg: &RuntimeConfig) -> TimeframeState {
    let trend: TrendSnapshot = classify(candles, cfg.trend_periods, cfg.trend_rule);

    let atr_result: Option<AtrResult> = atr_series(candles, cfg.atr_period);
    let atr = atr_result.as_ref().map(|r| r.last);
    let atr_ema = atr_result
        .as_ref()
        .and_then(|r| latest_ema(&r.series, cfg.atr_ema_period));
    let atr_pct = match (atr, candles.last()) {
        (Some(a), Some(last)) if last.close > 0.0 => Some(a / last.close * 100.0),
        _ => None,
    };

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let rsi = rsi(&closes, cfg.rsi_period);

    TimeframeState {
        trend,
        atr,
        atr_ema,
        atr_pct,
        rsi,
        candle_count: candles.len(),
        updated_ms: Utc::now().timestamp_millis(),
    }
}

/// Round a price to the nearest multiple of `step` (the ATM strike grid).
pub fn round_to_step(price: f64, step: f64) -> f64 {
    if !price.is_finite() || !step.is_finite() || step <= 0.0 {
        return price;
    }
    (price / step).round() * step
}

// =============================================================================
// Refresh path
// =============================================================================

/// Fetch, compute, and publish one full indicator sweep for every configured
/// symbol and timeframe, then evaluate the pullback strategies.
pub async fn refresh_once(state: &Arc<AppState>, client: &HistoryClient) {
    let cfg = state.runtime_config.read().clone();

    for symbol in &cfg.symbols {
        // Fan out across timeframes; each failure is isolated.
        let fetches = cfg.timeframes.iter().map(|spec| {
            let client = client.clone();
            let symbol = symbol.clone();
            let spec = spec.clone();
            async move {
                let result = client.fetch_candles(&symbol, &spec).await;
                (spec.label, result)
            }
        });

        for (label, result) in join_all(fetches).await {
            match result {
                Ok(raw) => {
                    let candles = sanitize_candles(&raw);
                    let tf_state = compute_timeframe_state(&candles, &cfg);
                    publish_timeframe(state, symbol, &label, &tf_state);
                    state.set_timeframe_state(symbol, &label, tf_state);
                }
                Err(e) => {
                    warn!(symbol, timeframe = %label, error = %e, "history fetch failed");
                    state.push_error(format!("history {symbol} {label}: {e}"));
                }
            }
        }

        evaluate_pullbacks(state, &cfg, symbol);
    }
}

fn publish_timeframe(state: &Arc<AppState>, symbol: &str, timeframe: &str, tf: &TimeframeState) {
    state.events.publish(Event::trend(
        symbol,
        timeframe,
        tf.trend.label,
        tf.trend.ltp,
    ));
    state.events.publish(Event::ema(
        symbol,
        timeframe,
        tf.trend.ema_short,
        tf.trend.ema_long,
        tf.trend.ema_superlong,
    ));
    state
        .events
        .publish(Event::atr(symbol, timeframe, tf.atr, tf.atr_ema, tf.atr_pct));
    state.events.publish(Event::rsi(symbol, timeframe, tf.rsi));
}

/// Run the main and scalp pullback strategies off the cached indicator state.
///
/// The main strategy reads trend, RSI, and ATR from the middle timeframe;
/// the scalp strategy reads everything from the fast timeframe.
fn evaluate_pullbacks(state: &Arc<AppState>, cfg: &RuntimeConfig, symbol: &str) {
    let main_label = match cfg.main_spec() {
        Some(s) => s.label.clone(),
        None => return,
    };
    let fast_label = match cfg.fast_spec() {
        Some(s) => s.label.clone(),
        None => return,
    };

    // Main strategy.
    if let Some(main) = state.timeframe_state(symbol, &main_label) {
        let decision = pullback::decide(main.trend.label, main.rsi, main.atr_pct, &cfg.pullback);
        let fast_trend = state
            .timeframe_state(symbol, &fast_label)
            .map(|f| f.trend.label)
            .unwrap_or_default();

        let decision = if cfg.latched {
            let mut latches = state.latches.write();
            let latch = latches.entry(symbol.to_string()).or_insert_with(MasterLatch::new);
            latch.on_evaluation(&decision, fast_trend)
        } else {
            decision
        };

        emit_signal(state, symbol, "pullback", &decision, None, None);
        record_audit(state, symbol, &main, fast_trend, &decision);
    }

    // Scalp strategy, entirely on the fast timeframe.
    if let Some(fast) = state.timeframe_state(symbol, &fast_label) {
        let decision = pullback::decide(fast.trend.label, fast.rsi, fast.atr_pct, &cfg.scalp);
        emit_signal(state, symbol, "scalp", &decision, None, None);
    }
}

fn emit_signal(
    state: &Arc<AppState>,
    symbol: &str,
    source: &str,
    signal: &Signal,
    price_change_pct: Option<f64>,
    oi_change_pct: Option<f64>,
) {
    state.events.publish(Event::Signal(crate::events::SignalEvent {
        symbol: symbol.to_string(),
        source: source.to_string(),
        kind: signal.kind,
        reason: signal.reason.clone(),
        volume_confirmed: signal.volume_confirmed,
        price_change_pct,
        oi_change_pct,
    }));

    if signal.kind.is_directional() {
        info!(symbol, source, kind = %signal.kind, reason = %signal.reason, "signal");
    } else {
        debug!(symbol, source, kind = %signal.kind, reason = %signal.reason, "no signal");
    }
    state.increment_version();
}

/// Append an audit row for a main-strategy evaluation that produced a
/// directional suggestion or a latch exit.
fn record_audit(
    state: &Arc<AppState>,
    symbol: &str,
    main: &TimeframeState,
    fast_trend: TrendLabel,
    decision: &Signal,
) {
    let is_exit = decision.reason.starts_with("exit-");
    if !decision.kind.is_directional() && !is_exit {
        return;
    }

    let ltp = state
        .live
        .get(symbol)
        .and_then(|l| l.last_price)
        .or(main.trend.ltp);
    let roc = state.last_roc.read().get(symbol).cloned();

    let row = AuditRow {
        trend_fast: fast_trend,
        trend_main: main.trend.label,
        roc_signal: roc.as_ref().map(|r| r.signal.kind),
        volume_confirmed: roc
            .as_ref()
            .map(|r| r.volume_confirmed)
            .unwrap_or(decision.volume_confirmed),
        suggestion: decision.kind,
        reason: decision.reason.clone(),
        entry_price: if is_exit { None } else { ltp },
        exit_price: if is_exit { ltp } else { None },
    };
    state.audit.record_best_effort(symbol, &row);
}

// =============================================================================
// Tick path
// =============================================================================

/// Handle one live ticker update: coalesce, publish spot/ATM, and run the
/// rate-of-change evaluation against the periodic snapshot.
pub fn on_tick(state: &Arc<AppState>, tick: &Tick) {
    let live = state.live.apply_tick(tick);
    state.increment_version();

    let cfg = state.runtime_config.read().clone();

    if let Some(ltp) = live.last_price {
        state.events.publish(Event::spot(&tick.symbol, ltp));
        state
            .events
            .publish(Event::atm(&tick.symbol, round_to_step(ltp, cfg.atm_step)));
    }

    let snapshot = match state.snapshots.get(&tick.symbol) {
        Some(s) => s,
        // No baseline until the first snapshot timer fires.
        None => return,
    };

    let fast = cfg
        .fast_spec()
        .and_then(|spec| state.timeframe_state(&tick.symbol, &spec.label));

    let gates = cfg
        .gates
        .effective_gates(fast.as_ref().and_then(|f| f.atr_pct));
    let eval = evaluate(&live, &snapshot, gates, cfg.strict_volume_confirm);

    let signal = if cfg.confirm_bearish {
        let broken = match fast.as_ref().map(|f| &f.trend) {
            Some(t) => match (t.ltp, t.ema_short, t.ema_long) {
                (Some(ltp), Some(es), Some(el)) => microstructure_broken(ltp, es, el),
                _ => false,
            },
            None => false,
        };
        let windows = state.persistence.read();
        let empty = PersistenceWindow::default();
        let window = windows.get(&tick.symbol).unwrap_or(&empty);
        confirm_bearish(eval.signal.clone(), window, broken)
    } else {
        eval.signal.clone()
    };

    // Record the raw classification after confirmation so a lone bearish
    // reading cannot vouch for itself.
    state
        .persistence
        .write()
        .entry(tick.symbol.clone())
        .or_default()
        .observe(eval.signal.kind);

    state.last_roc.write().insert(
        tick.symbol.clone(),
        RocEvaluation {
            signal: signal.clone(),
            price_change_pct: eval.price_change_pct,
            oi_change_pct: eval.oi_change_pct,
            volume_confirmed: eval.volume_confirmed,
        },
    );

    emit_signal(
        state,
        &tick.symbol,
        "roc",
        &signal,
        eval.price_change_pct,
        eval.oi_change_pct,
    );
}

// =============================================================================
// Periodic loops
// =============================================================================

fn refresh_interval(secs: u64) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(tokio::time::Duration::from_secs(secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker
}

/// Indicator refresh loop on a fixed-period interval. Never returns.
///
/// The interval is rebuilt when `refresh_secs` changes at runtime.
pub async fn run_refresh_loop(state: Arc<AppState>, client: HistoryClient) {
    let mut secs = state.runtime_config.read().refresh_secs;
    let mut ticker = refresh_interval(secs);
    loop {
        ticker.tick().await;
        refresh_once(&state, &client).await;

        let current = state.runtime_config.read().refresh_secs;
        if current != secs {
            secs = current;
            ticker = refresh_interval(secs);
        }
    }
}

/// Snapshot capture loop for the rate-of-change baseline. Never returns.
///
/// The first capture is delayed by one full window so the baseline always
/// represents "now - window".
pub async fn run_snapshot_loop(state: Arc<AppState>) {
    loop {
        let secs = state.runtime_config.read().snapshot_secs;
        tokio::time::sleep(tokio::time::Duration::from_secs(secs)).await;
        state.snapshots.capture(&state.live);
        state.increment_version();
        debug!("rate-of-change snapshot captured");
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SignalKind, TrendLabel};

    fn candle(time: i64, close: f64) -> Candle {
        Candle {
            time,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
        }
    }

    fn tick(symbol: &str, price: f64, oi: f64, volume: f64) -> Tick {
        Tick {
            symbol: symbol.to_string(),
            last_price: Some(price),
            open_interest: Some(oi),
            volume: Some(volume),
            timestamp_ms: Utc::now().timestamp_millis(),
        }
    }

    #[test]
    fn round_to_step_grid() {
        assert_eq!(round_to_step(65432.4, 1.0), 65432.0);
        assert_eq!(round_to_step(65432.6, 1.0), 65433.0);
        assert_eq!(round_to_step(65412.0, 50.0), 65400.0);
        assert_eq!(round_to_step(65430.0, 50.0), 65450.0);
        // Degenerate step leaves the price alone.
        assert_eq!(round_to_step(100.0, 0.0), 100.0);
    }

    #[test]
    fn compute_state_on_rising_series() {
        let cfg = RuntimeConfig::default();
        let candles: Vec<Candle> = (0..120).map(|i| candle(i, 100.0 + i as f64)).collect();
        let tf = compute_timeframe_state(&candles, &cfg);

        assert_eq!(tf.trend.label, TrendLabel::Bullish);
        assert!(tf.atr.is_some());
        assert!(tf.atr_ema.is_some());
        assert!(tf.atr_pct.unwrap() > 0.0);
        assert!(tf.rsi.unwrap() > 50.0);
        assert_eq!(tf.candle_count, 120);
    }

    #[test]
    fn compute_state_degrades_on_short_series() {
        let cfg = RuntimeConfig::default();
        let candles: Vec<Candle> = (0..10).map(|i| candle(i, 100.0)).collect();
        let tf = compute_timeframe_state(&candles, &cfg);

        assert_eq!(tf.trend.label, TrendLabel::Neutral);
        assert!(tf.atr.is_none());
        assert!(tf.rsi.is_none());
    }

    #[test]
    fn tick_before_first_snapshot_only_updates_live_state() {
        let state = Arc::new(AppState::new(RuntimeConfig::default()));
        on_tick(&state, &tick("BTCUSD", 65000.0, 1000.0, 10.0));

        assert_eq!(
            state.live.get("BTCUSD").unwrap().last_price,
            Some(65000.0)
        );
        // No baseline, so no persistence observation happened.
        assert!(state.persistence.read().get("BTCUSD").is_none());
    }

    #[tokio::test]
    async fn tick_path_publishes_spot_and_atm() {
        let state = Arc::new(AppState::new(RuntimeConfig::default()));
        let mut rx = state.events.subscribe();

        on_tick(&state, &tick("BTCUSD", 65432.6, 1000.0, 10.0));

        match rx.recv().await.unwrap() {
            Event::Spot(s) => assert_eq!(s.ltp, 65432.6),
            other => panic!("expected spot event, got {other:?}"),
        }
        match rx.recv().await.unwrap() {
            Event::Atm(a) => assert_eq!(a.atm, 65433.0),
            other => panic!("expected atm event, got {other:?}"),
        }
    }

    fn test_config() -> RuntimeConfig {
        let mut cfg = RuntimeConfig::default();
        let mut path = std::env::temp_dir();
        path.push(format!("vertex-engine-test-{}.csv", std::process::id()));
        cfg.audit_log_path = path.to_string_lossy().into_owned();
        cfg
    }

    #[tokio::test]
    async fn tick_after_snapshot_runs_roc_evaluation() {
        let state = Arc::new(AppState::new(test_config()));

        on_tick(&state, &tick("BTCUSD", 100.0, 100.0, 10.0));
        state.snapshots.capture(&state.live);

        let mut rx = state.events.subscribe();
        // Price +0.05%, OI +0.06%, volume up: LONG BUILDUP.
        on_tick(&state, &tick("BTCUSD", 100.05, 100.06, 11.0));

        let mut saw_signal = false;
        while let Ok(ev) = rx.try_recv() {
            if let Event::Signal(s) = ev {
                assert_eq!(s.source, "roc");
                assert_eq!(s.kind, SignalKind::LongBuildup);
                assert!(s.volume_confirmed);
                saw_signal = true;
            }
        }
        assert!(saw_signal, "expected a roc signal event");

        // The evaluation is cached for the next audit row, flag included.
        let cached = state.last_roc.read().get("BTCUSD").cloned().unwrap();
        assert_eq!(cached.signal.kind, SignalKind::LongBuildup);
        assert!(cached.volume_confirmed);
        assert!(cached.price_change_pct.unwrap() > 0.0);
    }

    #[tokio::test]
    async fn bearish_confirmation_downgrades_first_reading() {
        let mut cfg = test_config();
        cfg.confirm_bearish = true;
        let state = Arc::new(AppState::new(cfg));

        on_tick(&state, &tick("BTCUSD", 100.0, 100.0, 10.0));
        state.snapshots.capture(&state.live);

        let mut rx = state.events.subscribe();
        // Price down, OI up, volume up: raw SHORT BUILDUP, but no prior
        // persistence and no fast-timeframe state, so it must downgrade.
        on_tick(&state, &tick("BTCUSD", 99.9, 100.1, 11.0));

        let mut saw = false;
        while let Ok(ev) = rx.try_recv() {
            if let Event::Signal(s) = ev {
                assert_eq!(s.kind, SignalKind::Ignore);
                saw = true;
            }
        }
        assert!(saw);
        // The raw classification was still recorded for future persistence.
        assert!(state
            .persistence
            .read()
            .get("BTCUSD")
            .unwrap()
            .recently_observed(SignalKind::ShortBuildup));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_interval_keeps_a_fixed_period() {
        let mut ticker = refresh_interval(15);
        assert_eq!(ticker.period(), tokio::time::Duration::from_secs(15));

        // First tick fires immediately; later ticks land on period
        // boundaries regardless of how long the sweep took.
        ticker.tick().await;
        let before = tokio::time::Instant::now();
        ticker.tick().await;
        assert_eq!(
            tokio::time::Instant::now() - before,
            tokio::time::Duration::from_secs(15)
        );
    }

    #[test]
    fn directional_pullback_appends_audit_row() {
        let mut cfg = test_config();
        let mut path = std::env::temp_dir();
        path.push(format!("vertex-engine-pullback-{}.csv", std::process::id()));
        cfg.audit_log_path = path.to_string_lossy().into_owned();
        let _ = std::fs::remove_file(&path);

        let state = Arc::new(AppState::new(cfg.clone()));
        let bullish = TimeframeState {
            trend: TrendSnapshot {
                label: TrendLabel::Bullish,
                ema_short: Some(105.0),
                ema_long: Some(100.0),
                ema_superlong: None,
                ltp: Some(110.0),
            },
            atr: Some(1.0),
            atr_ema: Some(1.0),
            atr_pct: Some(0.5),
            rsi: Some(33.0), // in the pullback zone
            candle_count: 120,
            updated_ms: 0,
        };
        state.set_timeframe_state("BTCUSD", "15 Min", bullish.clone());
        state.set_timeframe_state("BTCUSD", "5 Min", bullish);

        evaluate_pullbacks(&state, &cfg, "BTCUSD");

        let content = std::fs::read_to_string(&path).unwrap();
        let row = content.lines().nth(1).unwrap();
        assert!(row.contains("BTCUSD,BULLISH,BULLISH"));
        assert!(row.contains(",LONG,"));
        assert!(row.contains("110")); // entry price from the trend ltp

        let _ = std::fs::remove_file(&path);
    }
}
