// =============================================================================
// Live Ticker Stream
// =============================================================================
//
// Connects to the exchange websocket, subscribes to the v2/ticker channel for
// one symbol and feeds parsed ticks into the engine's live state path.
//
// Runs until the stream disconnects or an error occurs; `supervise_ticker`
// wraps it in a reconnect loop with a fixed delay.
//
// The exchange sends an application-level `{"type":"ping"}` that expects a
// JSON pong in reply; transport-level ping frames are answered by tungstenite
// itself.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::app_state::AppState;
use crate::feed::ConnState;
use crate::market_data::Tick;

/// Extract a numeric field that the exchange may send as a number or string.
fn num_field(v: &Value, key: &str) -> Option<f64> {
    match v.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .filter(|x| x.is_finite())
}

/// Parse a v2/ticker frame into a tick, or None for any other message type.
pub fn parse_tick(text: &str, symbol: &str) -> Option<Tick> {
    let v: Value = serde_json::from_str(text).ok()?;
    if v.get("type").and_then(Value::as_str) != Some("v2/ticker") {
        return None;
    }
    if v.get("symbol").and_then(Value::as_str) != Some(symbol) {
        return None;
    }

    let last_price = num_field(&v, "close")
        .or_else(|| num_field(&v, "last"))
        .or_else(|| num_field(&v, "price"));

    Some(Tick {
        symbol: symbol.to_string(),
        last_price,
        open_interest: num_field(&v, "oi"),
        volume: num_field(&v, "volume"),
        timestamp_ms: Utc::now().timestamp_millis(),
    })
}

fn is_app_ping(text: &str) -> bool {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| v.get("type").and_then(Value::as_str).map(|t| t == "ping"))
        .unwrap_or(false)
}

/// Connect, subscribe, and pump ticks until the stream ends.
pub async fn run_ticker_stream(state: &Arc<AppState>, symbol: &str) -> Result<()> {
    let ws_url = state.runtime_config.read().ws_url.clone();

    state.set_feed_state(symbol, ConnState::Connecting);
    info!(url = %ws_url, symbol, "connecting to ticker websocket");

    let (ws_stream, _response) = connect_async(&ws_url)
        .await
        .context("failed to connect to ticker websocket")?;

    let (mut write, mut read) = ws_stream.split();

    let subscribe = json!({
        "type": "subscribe",
        "payload": { "channels": [{ "name": "v2/ticker", "symbols": [symbol] }] }
    });
    write
        .send(Message::Text(subscribe.to_string()))
        .await
        .context("failed to send ticker subscription")?;

    state.set_feed_state(symbol, ConnState::Connected);
    info!(symbol, "ticker websocket connected");

    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                if is_app_ping(&text) {
                    let pong = json!({ "type": "pong" }).to_string();
                    if let Err(e) = write.send(Message::Text(pong)).await {
                        warn!(symbol, error = %e, "failed to send pong");
                        return Err(e.into());
                    }
                    continue;
                }
                if let Some(tick) = parse_tick(&text, symbol) {
                    crate::engine::on_tick(state, &tick);
                } else {
                    debug!(symbol, "non-ticker message ignored");
                }
            }
            Some(Ok(Message::Ping(data))) => {
                if let Err(e) = write.send(Message::Pong(data)).await {
                    warn!(symbol, error = %e, "failed to send pong frame");
                    return Err(e.into());
                }
            }
            Some(Ok(Message::Close(_))) => {
                warn!(symbol, "ticker websocket closed by peer");
                return Ok(());
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                error!(symbol, error = %e, "ticker websocket read error");
                return Err(e.into());
            }
            None => {
                warn!(symbol, "ticker websocket stream ended");
                return Ok(());
            }
        }
    }
}

/// Reconnect loop around [`run_ticker_stream`]. Never returns.
pub async fn supervise_ticker(state: Arc<AppState>, symbol: String) {
    loop {
        if let Err(e) = run_ticker_stream(&state, &symbol).await {
            error!(symbol = %symbol, error = %e, "ticker stream error");
            state.push_error(format!("ticker stream {symbol}: {e}"));
        }
        state.set_feed_state(&symbol, ConnState::Disconnected);

        let delay = state.runtime_config.read().reconnect_secs;
        info!(symbol = %symbol, delay_secs = delay, "reconnecting ticker stream");
        tokio::time::sleep(tokio::time::Duration::from_secs(delay)).await;
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_ticker_frame() {
        let text = r#"{
            "type": "v2/ticker", "symbol": "BTCUSD",
            "close": 65000.5, "oi": "123456.0", "volume": 987.5
        }"#;
        let tick = parse_tick(text, "BTCUSD").unwrap();
        assert_eq!(tick.last_price, Some(65000.5));
        assert_eq!(tick.open_interest, Some(123456.0));
        assert_eq!(tick.volume, Some(987.5));
    }

    #[test]
    fn price_falls_back_to_last_then_price() {
        let tick = parse_tick(
            r#"{"type":"v2/ticker","symbol":"BTCUSD","last":"64000"}"#,
            "BTCUSD",
        )
        .unwrap();
        assert_eq!(tick.last_price, Some(64000.0));

        let tick = parse_tick(
            r#"{"type":"v2/ticker","symbol":"BTCUSD","price":63000}"#,
            "BTCUSD",
        )
        .unwrap();
        assert_eq!(tick.last_price, Some(63000.0));
    }

    #[test]
    fn missing_fields_stay_none() {
        let tick = parse_tick(
            r#"{"type":"v2/ticker","symbol":"BTCUSD","close":65000.0}"#,
            "BTCUSD",
        )
        .unwrap();
        assert!(tick.open_interest.is_none());
        assert!(tick.volume.is_none());
    }

    #[test]
    fn other_symbols_and_types_are_ignored() {
        assert!(parse_tick(
            r#"{"type":"v2/ticker","symbol":"ETHUSD","close":3000.0}"#,
            "BTCUSD"
        )
        .is_none());
        assert!(parse_tick(r#"{"type":"subscriptions"}"#, "BTCUSD").is_none());
        assert!(parse_tick("not json", "BTCUSD").is_none());
    }

    #[test]
    fn app_ping_detection() {
        assert!(is_app_ping(r#"{"type":"ping"}"#));
        assert!(!is_app_ping(r#"{"type":"v2/ticker"}"#));
        assert!(!is_app_ping("garbage"));
    }
}
