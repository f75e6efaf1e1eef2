// =============================================================================
// Candle History Client
// =============================================================================
//
// Thin REST client for the exchange's candle history endpoint:
//
//   GET {base}?resolution=15m&symbol=BTCUSD&start=<unix_s>&end=<unix_s>
//
// The response wraps the candle array in a `result` field. Rows are returned
// raw; sanitization (drops, defaults, ordering) is the caller's concern.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::market_data::RawCandle;
use crate::runtime_config::TimeframeSpec;

/// History endpoint response envelope.
#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    result: Vec<RawCandle>,
}

/// REST client for candle history.
#[derive(Clone)]
pub struct HistoryClient {
    base_url: String,
    client: reqwest::Client,
}

impl HistoryClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build history HTTP client")?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    /// Fetch raw candles for `symbol` at the spec's resolution, covering the
    /// spec's lookback window up to now.
    #[instrument(skip(self, spec), fields(resolution = %spec.resolution))]
    pub async fn fetch_candles(&self, symbol: &str, spec: &TimeframeSpec) -> Result<Vec<RawCandle>> {
        let end = Utc::now().timestamp();
        let start = end - i64::from(spec.lookback_days) * 86_400;
        let start = start.to_string();
        let end = end.to_string();

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("resolution", spec.resolution.as_str()),
                ("symbol", symbol),
                ("start", start.as_str()),
                ("end", end.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("history request failed for {symbol} {}", spec.resolution))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("history request for {symbol} returned {status}: {body}");
        }

        let parsed: HistoryResponse = resp
            .json()
            .await
            .with_context(|| format!("failed to parse history response for {symbol}"))?;

        if parsed.success == Some(false) {
            bail!("history endpoint reported failure for {symbol} {}", spec.resolution);
        }

        debug!(
            symbol,
            candles = parsed.result.len(),
            "candle history fetched"
        );
        Ok(parsed.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_envelope_parses() {
        let json = r#"{
            "success": true,
            "result": [
                { "time": 1700000000, "open": 100.0, "high": 101.0, "low": 99.0, "close": 100.5, "volume": 12.0 },
                { "time": 1700000900, "close": 101.0 }
            ]
        }"#;
        let resp: HistoryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.success, Some(true));
        assert_eq!(resp.result.len(), 2);
        assert_eq!(resp.result[1].close, Some(101.0));
        assert!(resp.result[1].open.is_none());
    }

    #[test]
    fn missing_result_field_is_empty() {
        let resp: HistoryResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.result.is_empty());
        assert!(resp.success.is_none());
    }
}
