// =============================================================================
// Runtime Configuration — Engine settings with atomic save
// =============================================================================
//
// Central configuration hub for the Vertex signal engine.  Every tunable
// parameter lives here so the engine can be redeployed against different
// symbols, timeframes and gate levels without a code change.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::signals::{GateConfig, PullbackParams, RsiEntryPolicy};
use crate::trend::{TrendPeriods, TrendRule};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    vec!["BTCUSD".to_string(), "ETHUSD".to_string()]
}

fn default_timeframes() -> Vec<TimeframeSpec> {
    vec![
        TimeframeSpec::new("1 Hour", "1h", 7),
        TimeframeSpec::new("15 Min", "15m", 3),
        TimeframeSpec::new("5 Min", "5m", 2),
    ]
}

fn default_fast_timeframe() -> String {
    "5 Min".to_string()
}

fn default_atr_period() -> usize {
    14
}

fn default_atr_ema_period() -> usize {
    20
}

fn default_rsi_period() -> usize {
    14
}

fn default_refresh_secs() -> u64 {
    15
}

fn default_snapshot_secs() -> u64 {
    180
}

fn default_reconnect_secs() -> u64 {
    5
}

fn default_scalp_params() -> PullbackParams {
    PullbackParams {
        policy: RsiEntryPolicy::default(),
        min_atr_pct: 0.02,
    }
}

fn default_atm_step() -> f64 {
    1.0
}

fn default_history_url() -> String {
    "https://api.india.delta.exchange/v2/history/candles".to_string()
}

fn default_ws_url() -> String {
    "wss://socket.india.delta.exchange".to_string()
}

fn default_audit_log_path() -> String {
    "signals.csv".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

// =============================================================================
// TimeframeSpec
// =============================================================================

/// One candle timeframe the engine maintains indicators for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeSpec {
    /// Human label used in events and keys, e.g. "15 Min".
    pub label: String,
    /// Provider resolution string for the history API, e.g. "15m".
    pub resolution: String,
    /// How many days of history to request on each refresh.
    pub lookback_days: u32,
}

impl TimeframeSpec {
    pub fn new(label: &str, resolution: &str, lookback_days: u32) -> Self {
        Self {
            label: label.to_string(),
            resolution: resolution.to_string(),
            lookback_days,
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the Vertex engine.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Universe -----------------------------------------------------------

    /// Symbols the engine watches.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Timeframes indicators are maintained for, slowest first.
    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<TimeframeSpec>,

    /// Label of the fast timeframe used for latch exits and scalp entries.
    #[serde(default = "default_fast_timeframe")]
    pub fast_timeframe: String,

    // --- Indicator periods --------------------------------------------------

    /// EMA periods used by the trend classifier.
    #[serde(default)]
    pub trend_periods: TrendPeriods,

    /// Trend classification rule.
    #[serde(default)]
    pub trend_rule: TrendRule,

    /// ATR lookback period (Wilder).
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,

    /// EMA period applied over the ATR series for the smoothed-ATR event.
    #[serde(default = "default_atr_ema_period")]
    pub atr_ema_period: usize,

    /// RSI lookback period (Wilder).
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    // --- Scheduling ---------------------------------------------------------

    /// Seconds between indicator refresh sweeps.
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,

    /// Seconds between live-state snapshot captures (rate-of-change window).
    #[serde(default = "default_snapshot_secs")]
    pub snapshot_secs: u64,

    /// Fixed delay before reconnecting a dropped ticker stream.
    #[serde(default = "default_reconnect_secs")]
    pub reconnect_secs: u64,

    // --- Rate-of-change decision engine -------------------------------------

    /// Price/OI gate levels and adaptive-gate settings.
    #[serde(default)]
    pub gates: GateConfig,

    /// When true, volume must strictly increase for buildup confirmation;
    /// when false, flat volume also confirms.
    #[serde(default)]
    pub strict_volume_confirm: bool,

    /// Require the persistence + microstructure gate before bearish-leaning
    /// classifications may fire.
    #[serde(default)]
    pub confirm_bearish: bool,

    // --- Pullback strategies -------------------------------------------------

    /// Main pullback strategy (slow timeframe trend).
    #[serde(default)]
    pub pullback: PullbackParams,

    /// Scalp pullback strategy (fast timeframe trend, lower ATR floor).
    #[serde(default = "default_scalp_params")]
    pub scalp: PullbackParams,

    /// Wrap pullback decisions in the latched master-signal machine.
    #[serde(default)]
    pub latched: bool,

    // --- Presentation --------------------------------------------------------

    /// Step the at-the-money strike is rounded to.
    #[serde(default = "default_atm_step")]
    pub atm_step: f64,

    // --- External endpoints --------------------------------------------------

    /// Candle history REST endpoint.
    #[serde(default = "default_history_url")]
    pub history_url: String,

    /// Ticker websocket endpoint.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Append-only CSV audit log path.
    #[serde(default = "default_audit_log_path")]
    pub audit_log_path: String,

    /// HTTP/websocket bind address.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            timeframes: default_timeframes(),
            fast_timeframe: default_fast_timeframe(),
            trend_periods: TrendPeriods::default(),
            trend_rule: TrendRule::default(),
            atr_period: default_atr_period(),
            atr_ema_period: default_atr_ema_period(),
            rsi_period: default_rsi_period(),
            refresh_secs: default_refresh_secs(),
            snapshot_secs: default_snapshot_secs(),
            reconnect_secs: default_reconnect_secs(),
            gates: GateConfig::default(),
            strict_volume_confirm: false,
            confirm_bearish: false,
            pullback: PullbackParams::default(),
            scalp: default_scalp_params(),
            latched: false,
            atm_step: default_atm_step(),
            history_url: default_history_url(),
            ws_url: default_ws_url(),
            audit_log_path: default_audit_log_path(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            timeframes = config.timeframes.len(),
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// The timeframe spec matching the configured fast label, falling back to
    /// the last (fastest) entry.
    pub fn fast_spec(&self) -> Option<&TimeframeSpec> {
        self.timeframes
            .iter()
            .find(|tf| tf.label == self.fast_timeframe)
            .or_else(|| self.timeframes.last())
    }

    /// The middle timeframe driving the main pullback strategy, falling back
    /// to the first entry.
    pub fn main_spec(&self) -> Option<&TimeframeSpec> {
        self.timeframes.get(1).or_else(|| self.timeframes.first())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.symbols, vec!["BTCUSD", "ETHUSD"]);
        assert_eq!(cfg.timeframes.len(), 3);
        assert_eq!(cfg.timeframes[0].label, "1 Hour");
        assert_eq!(cfg.timeframes[2].resolution, "5m");
        assert_eq!(cfg.fast_timeframe, "5 Min");
        assert_eq!(cfg.atr_period, 14);
        assert_eq!(cfg.rsi_period, 14);
        assert_eq!(cfg.refresh_secs, 15);
        assert_eq!(cfg.snapshot_secs, 180);
        assert!(!cfg.strict_volume_confirm);
        assert!(!cfg.latched);
        assert!((cfg.pullback.min_atr_pct - 0.03).abs() < f64::EPSILON);
        assert!((cfg.scalp.min_atr_pct - 0.02).abs() < f64::EPSILON);
        assert!((cfg.gates.price_gate_pct - 0.04).abs() < f64::EPSILON);
        assert!((cfg.gates.oi_gate_pct - 0.05).abs() < f64::EPSILON);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.symbols, vec!["BTCUSD", "ETHUSD"]);
        assert_eq!(cfg.refresh_secs, 15);
        assert_eq!(cfg.trend_periods.short, 20);
        assert_eq!(cfg.trend_periods.long, 50);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "symbols": ["SOLUSD"], "refresh_secs": 30 }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.symbols, vec!["SOLUSD"]);
        assert_eq!(cfg.refresh_secs, 30);
        assert_eq!(cfg.snapshot_secs, 180);
        assert_eq!(cfg.timeframes.len(), 3);
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = RuntimeConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: RuntimeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.symbols, cfg2.symbols);
        assert_eq!(cfg.timeframes, cfg2.timeframes);
        assert_eq!(cfg.refresh_secs, cfg2.refresh_secs);
    }

    #[test]
    fn fast_and_main_spec_selection() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.fast_spec().unwrap().label, "5 Min");
        assert_eq!(cfg.main_spec().unwrap().label, "15 Min");

        let mut cfg = RuntimeConfig::default();
        cfg.fast_timeframe = "2 Min".to_string();
        // Unknown label falls back to the fastest configured entry.
        assert_eq!(cfg.fast_spec().unwrap().label, "5 Min");
    }
}
