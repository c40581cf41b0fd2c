// =============================================================================
// Intraday History Client — chart REST API
// =============================================================================
//
// Fetches a few days of 5-minute OHLCV bars for one symbol per request. The
// chart API reports each field as a parallel array aligned on a shared
// timestamp array; entries for halted or partial bars come back null and are
// dropped during parsing rather than surfaced as errors.
// =============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime};
use tracing::{debug, instrument, warn};

use crate::market_data::bar::{clean, Bar};

/// Source of per-symbol bar series for the scanner.
///
/// The scanner is written against this trait so the fetch collaborator can be
/// replaced in tests with a canned in-memory source.
pub trait BarSource {
    fn fetch_series(
        &self,
        symbol: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Bar>>> + Send;
}

/// HTTP client for the intraday chart endpoint.
#[derive(Clone)]
pub struct HistoryClient {
    base_url: String,
    range: String,
    interval: String,
    tz_offset_minutes: i32,
    client: reqwest::Client,
}

impl HistoryClient {
    /// Create a new history client.
    ///
    /// # Arguments
    /// * `history_days`       — lookback window in days (e.g. 5).
    /// * `interval`           — bar interval, e.g. "5m".
    /// * `tz_offset_minutes`  — UTC offset of the exchange's local time, used
    ///                          to convert epoch timestamps (IST is +330).
    pub fn new(history_days: u32, interval: &str, tz_offset_minutes: i32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("failed to build reqwest client");

        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            range: format!("{history_days}d"),
            interval: interval.to_string(),
            tz_offset_minutes,
            client,
        }
    }

    /// Override the base URL (stub servers in integration setups).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl BarSource for HistoryClient {
    /// GET /v8/finance/chart/{symbol} — fetch and parse one symbol's bars.
    ///
    /// Returns an empty vector (not an error) when the API answers without
    /// usable rows; the scanner treats that the same as missing data.
    async fn fetch_series(&self, symbol: &str) -> Result<Vec<Bar>> {
        let url = format!(
            "{}/v8/finance/chart/{}?range={}&interval={}",
            self.base_url, symbol, self.range, self.interval
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("chart request for {symbol} failed"))?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .with_context(|| format!("failed to parse chart response for {symbol}"))?;

        if !status.is_success() {
            anyhow::bail!("chart API returned {} for {}: {}", status, symbol, body);
        }

        let bars = parse_chart_response(&body, self.tz_offset_minutes)?;
        debug!(symbol, count = bars.len(), "bars fetched");
        Ok(bars)
    }
}

/// Parse a chart API response body into cleaned bars.
///
/// Rows where any of timestamp/open/high/low/close/volume is missing or null
/// are dropped. The surviving bars are run through [`clean`] so the series
/// invariants (finite non-negative fields, strictly increasing timestamps)
/// hold regardless of what the API returned.
#[instrument(skip(body), name = "history::parse_chart")]
pub fn parse_chart_response(body: &serde_json::Value, tz_offset_minutes: i32) -> Result<Vec<Bar>> {
    let result = body["chart"]["result"]
        .as_array()
        .and_then(|arr| arr.first())
        .context("chart response missing result")?;

    let timestamps = match result["timestamp"].as_array() {
        Some(ts) => ts,
        // A valid but empty response (unknown symbol, no session data).
        None => return Ok(Vec::new()),
    };

    let quote = result["indicators"]["quote"]
        .as_array()
        .and_then(|arr| arr.first())
        .context("chart response missing quote block")?;

    let opens = quote_field(quote, "open");
    let highs = quote_field(quote, "high");
    let lows = quote_field(quote, "low");
    let closes = quote_field(quote, "close");
    let volumes = quote_field(quote, "volume");

    let offset = Duration::minutes(tz_offset_minutes as i64);
    let mut bars = Vec::with_capacity(timestamps.len());
    let mut dropped = 0usize;

    for (i, ts_val) in timestamps.iter().enumerate() {
        let parsed = ts_val.as_i64().and_then(|epoch| {
            let ts = to_local(epoch, offset)?;
            Some(Bar {
                ts,
                open: opens.get(i)?.as_f64()?,
                high: highs.get(i)?.as_f64()?,
                low: lows.get(i)?.as_f64()?,
                close: closes.get(i)?.as_f64()?,
                volume: volumes.get(i)?.as_f64()?,
            })
        });

        match parsed {
            Some(bar) => bars.push(bar),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        warn!(dropped, "dropped incomplete chart rows");
    }

    Ok(clean(bars))
}

fn quote_field<'a>(quote: &'a serde_json::Value, name: &str) -> &'a [serde_json::Value] {
    quote[name].as_array().map(Vec::as_slice).unwrap_or(&[])
}

/// Convert an epoch-seconds timestamp to exchange-local naive time.
fn to_local(epoch: i64, offset: Duration) -> Option<NaiveDateTime> {
    let utc = DateTime::from_timestamp(epoch, 0)?.naive_utc();
    utc.checked_add_signed(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// 2026-08-07 03:45 UTC == 09:15 IST.
    const SESSION_OPEN_EPOCH: i64 = 1_786_074_300;

    fn chart_body(
        timestamps: Vec<serde_json::Value>,
        closes: Vec<serde_json::Value>,
    ) -> serde_json::Value {
        let n = timestamps.len();
        let ones: Vec<serde_json::Value> = closes.clone();
        json!({
            "chart": {
                "result": [{
                    "timestamp": timestamps,
                    "indicators": { "quote": [{
                        "open": ones.clone(),
                        "high": ones.clone(),
                        "low": ones,
                        "close": closes,
                        "volume": vec![json!(1000.0); n],
                    }]}
                }],
                "error": null
            }
        })
    }

    #[test]
    fn parse_basic_rows() {
        let body = chart_body(
            vec![
                json!(SESSION_OPEN_EPOCH),
                json!(SESSION_OPEN_EPOCH + 300),
                json!(SESSION_OPEN_EPOCH + 600),
            ],
            vec![json!(100.0), json!(101.0), json!(102.0)],
        );
        let bars = parse_chart_response(&body, 330).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].close, 100.0);
        // Epoch converted into IST local time.
        assert_eq!(
            bars[0].ts.format("%Y-%m-%d %H:%M").to_string(),
            "2026-08-07 09:15"
        );
        assert_eq!(
            bars[1].ts.format("%H:%M").to_string(),
            "09:20"
        );
    }

    #[test]
    fn parse_drops_null_rows() {
        let body = chart_body(
            vec![
                json!(SESSION_OPEN_EPOCH),
                json!(SESSION_OPEN_EPOCH + 300),
                json!(SESSION_OPEN_EPOCH + 600),
            ],
            vec![json!(100.0), json!(null), json!(102.0)],
        );
        let bars = parse_chart_response(&body, 330).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 102.0);
    }

    #[test]
    fn parse_empty_result_is_ok() {
        let body = json!({
            "chart": { "result": [{ "meta": {}, "indicators": { "quote": [{}] } }], "error": null }
        });
        let bars = parse_chart_response(&body, 330).unwrap();
        assert!(bars.is_empty());
    }

    #[test]
    fn parse_missing_result_is_error() {
        let body = json!({ "chart": { "result": null, "error": { "code": "Not Found" } } });
        assert!(parse_chart_response(&body, 330).is_err());
    }
}
