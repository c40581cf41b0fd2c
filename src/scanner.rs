// =============================================================================
// Multi-Symbol Scanner
// =============================================================================
//
// Runs the indicator + signal pipeline across the whole universe, one symbol
// at a time. Symbols whose fetch fails, comes back empty, or is shorter than
// the minimum bar count are skipped with a warning; the scan only fails when
// no symbol at all had enough history.
//
// A session-time filter drops rows before the configured start (10:00
// exchange-local) — the first half-hour is too thin to trust the signals.
// =============================================================================

use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::market_data::BarSource;
use crate::strategy::{evaluate_series, SignalRow};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// One evaluated row tagged with its symbol.
#[derive(Debug, Clone, Serialize)]
pub struct TaggedRow {
    pub stock: String,
    #[serde(flatten)]
    pub row: SignalRow,
}

/// The combined table across all symbols, plus scan metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub rows: Vec<TaggedRow>,
    pub scanned_at: DateTime<Utc>,
    pub symbols_scanned: usize,
    pub symbols_skipped: usize,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScanError {
    #[error("no symbol produced at least {minimum} bars — nothing to evaluate")]
    NoQualifyingData { minimum: usize },
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

/// Fetch, compute, and evaluate every symbol in `symbols` sequentially.
///
/// Returns the concatenated signal table, already session-time filtered, or
/// [`ScanError::NoQualifyingData`] when every symbol was skipped.
pub async fn scan_universe<S: BarSource>(
    source: &S,
    symbols: &[String],
    min_bars: usize,
    session_start: NaiveTime,
) -> Result<ScanResult, ScanError> {
    let mut rows: Vec<TaggedRow> = Vec::new();
    let mut symbols_scanned = 0usize;
    let mut symbols_skipped = 0usize;

    for symbol in symbols {
        let bars = match source.fetch_series(symbol).await {
            Ok(bars) => bars,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "skipping symbol — fetch failed");
                symbols_skipped += 1;
                continue;
            }
        };

        if bars.len() < min_bars {
            warn!(
                symbol = %symbol,
                bars = bars.len(),
                minimum = min_bars,
                "skipping symbol — insufficient history"
            );
            symbols_skipped += 1;
            continue;
        }

        let evaluated = evaluate_series(&bars);
        rows.extend(evaluated.into_iter().map(|row| TaggedRow {
            stock: symbol.clone(),
            row,
        }));
        symbols_scanned += 1;
    }

    if symbols_scanned == 0 {
        return Err(ScanError::NoQualifyingData { minimum: min_bars });
    }

    // Early-session rows are noise; keep everything from session_start on.
    rows.retain(|r| r.row.indicators.bar.ts.time() >= session_start);

    info!(
        symbols_scanned,
        symbols_skipped,
        rows = rows.len(),
        "scan complete"
    );

    Ok(ScanResult {
        rows,
        scanned_at: Utc::now(),
        symbols_scanned,
        symbols_skipped,
    })
}

/// The freshest row per symbol, in scan order. Rows arrive grouped by symbol
/// with timestamps ascending within each group, so this is the last row of
/// each group.
pub fn latest_rows<'a>(result: &'a ScanResult) -> Vec<&'a TaggedRow> {
    let mut latest: Vec<&TaggedRow> = Vec::new();
    for row in &result.rows {
        match latest.last() {
            Some(prev) if prev.stock == row.stock => {
                *latest.last_mut().unwrap() = row;
            }
            _ => latest.push(row),
        }
    }
    latest
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::Bar;
    use anyhow::Result;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    /// Canned bar source for pipeline tests.
    struct StubSource {
        series: HashMap<String, Vec<Bar>>,
    }

    impl BarSource for StubSource {
        async fn fetch_series(&self, symbol: &str) -> Result<Vec<Bar>> {
            match self.series.get(symbol) {
                Some(bars) => Ok(bars.clone()),
                None => anyhow::bail!("no data for {symbol}"),
            }
        }
    }

    /// A well-formed series of `n` bars at 5-minute spacing from 09:15.
    fn series(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.1).sin();
                Bar {
                    ts: NaiveDate::from_ymd_opt(2026, 8, 7)
                        .unwrap()
                        .and_hms_opt(9, 15, 0)
                        .unwrap()
                        + chrono::Duration::minutes(5 * i as i64),
                    open: close,
                    high: close + 0.5,
                    low: close - 0.5,
                    close,
                    volume: 1000.0,
                }
            })
            .collect()
    }

    fn ten_am() -> NaiveTime {
        NaiveTime::from_hms_opt(10, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn short_series_is_excluded() {
        let source = StubSource {
            series: HashMap::from([
                ("GOOD.NS".to_string(), series(200)),
                ("SHORT.NS".to_string(), series(159)),
            ]),
        };
        let symbols = vec!["GOOD.NS".to_string(), "SHORT.NS".to_string()];
        let result = scan_universe(&source, &symbols, 160, ten_am()).await.unwrap();

        assert_eq!(result.symbols_scanned, 1);
        assert_eq!(result.symbols_skipped, 1);
        assert!(result.rows.iter().all(|r| r.stock == "GOOD.NS"));
    }

    #[tokio::test]
    async fn fetch_failure_is_skipped_not_fatal() {
        let source = StubSource {
            series: HashMap::from([("GOOD.NS".to_string(), series(200))]),
        };
        let symbols = vec!["MISSING.NS".to_string(), "GOOD.NS".to_string()];
        let result = scan_universe(&source, &symbols, 160, ten_am()).await.unwrap();
        assert_eq!(result.symbols_scanned, 1);
        assert_eq!(result.symbols_skipped, 1);
    }

    #[tokio::test]
    async fn all_symbols_skipped_is_an_error() {
        let source = StubSource {
            series: HashMap::from([("SHORT.NS".to_string(), series(10))]),
        };
        let symbols = vec!["SHORT.NS".to_string(), "MISSING.NS".to_string()];
        let err = scan_universe(&source, &symbols, 160, ten_am()).await.unwrap_err();
        assert!(matches!(err, ScanError::NoQualifyingData { minimum: 160 }));
    }

    #[tokio::test]
    async fn early_session_rows_are_dropped() {
        let source = StubSource {
            series: HashMap::from([("GOOD.NS".to_string(), series(200))]),
        };
        let symbols = vec!["GOOD.NS".to_string()];
        let result = scan_universe(&source, &symbols, 160, ten_am()).await.unwrap();

        assert!(!result.rows.is_empty());
        for row in &result.rows {
            assert!(row.row.indicators.bar.ts.time() >= ten_am());
        }
        // 09:15..09:55 is nine 5-minute bars, all dropped.
        assert_eq!(result.rows.len(), 200 - 9);
    }

    #[tokio::test]
    async fn rows_are_tagged_and_concatenated_in_scan_order() {
        let source = StubSource {
            series: HashMap::from([
                ("A.NS".to_string(), series(170)),
                ("B.NS".to_string(), series(170)),
            ]),
        };
        let symbols = vec!["A.NS".to_string(), "B.NS".to_string()];
        let result = scan_universe(&source, &symbols, 160, ten_am()).await.unwrap();

        let split = result.rows.iter().position(|r| r.stock == "B.NS").unwrap();
        assert!(result.rows[..split].iter().all(|r| r.stock == "A.NS"));
        assert!(result.rows[split..].iter().all(|r| r.stock == "B.NS"));

        let latest = latest_rows(&result);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].stock, "A.NS");
        assert_eq!(latest[1].stock, "B.NS");
        // Freshest row per symbol is the series tail.
        let last_ts = series(170).last().unwrap().ts;
        assert_eq!(latest[0].row.indicators.bar.ts, last_ts);
    }
}
