// =============================================================================
// Runtime Configuration — engine settings with atomic save
// =============================================================================
//
// Every tunable parameter lives here. Persistence uses an atomic tmp + rename
// pattern to prevent corruption on crash. All fields carry `#[serde(default)]`
// so that adding new fields never breaks loading an older config file.
//
// Credentials are NOT part of this file — they come from the environment
// (`KITE_API_KEY`, `KITE_ACCESS_TOKEN`).
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::{ExitScope, TradingMode};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_universe_csv() -> String {
    "nifty_stocks.csv".to_string()
}

fn default_exchange() -> String {
    "NFO".to_string()
}

fn default_underlying() -> String {
    "NIFTY".to_string()
}

fn default_spot_symbol() -> String {
    "NSE:NIFTY 50".to_string()
}

fn default_product() -> String {
    "MIS".to_string()
}

fn default_order_qty() -> u32 {
    50
}

fn default_strike_step() -> f64 {
    50.0
}

fn default_min_bars() -> usize {
    160
}

fn default_session_start() -> String {
    "10:00".to_string()
}

fn default_scan_interval_secs() -> u64 {
    300
}

fn default_history_days() -> u32 {
    5
}

fn default_bar_interval() -> String {
    "5m".to_string()
}

fn default_tz_offset_minutes() -> i32 {
    330
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the signal engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Operational modes ---------------------------------------------------

    /// Paper (simulated orders) or Live (real broker submission).
    #[serde(default)]
    pub trading_mode: TradingMode,

    /// Which open positions an exit signal closes.
    #[serde(default)]
    pub exit_scope: ExitScope,

    // --- Scan universe & data ------------------------------------------------

    /// CSV file with the "Stock" column providing the scan list.
    #[serde(default = "default_universe_csv")]
    pub universe_csv: String,

    /// Minimum bar count for a symbol to be evaluated (the largest indicator
    /// window is 150 bars).
    #[serde(default = "default_min_bars")]
    pub min_bars: usize,

    /// History lookback for the chart fetch, in days.
    #[serde(default = "default_history_days")]
    pub history_days: u32,

    /// Bar interval for the chart fetch.
    #[serde(default = "default_bar_interval")]
    pub bar_interval: String,

    /// Exchange-local UTC offset in minutes (IST is +330).
    #[serde(default = "default_tz_offset_minutes")]
    pub tz_offset_minutes: i32,

    /// Rows before this exchange-local time are dropped, "HH:MM".
    #[serde(default = "default_session_start")]
    pub session_start: String,

    /// Seconds between scan passes.
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    // --- Order routing -------------------------------------------------------

    /// Derivatives exchange segment for orders and the instrument dump.
    #[serde(default = "default_exchange")]
    pub exchange: String,

    /// Underlying name used for contract resolution.
    #[serde(default = "default_underlying")]
    pub underlying: String,

    /// Quote key for the spot price lookup.
    #[serde(default = "default_spot_symbol")]
    pub spot_symbol: String,

    /// Strike grid step for ATM rounding.
    #[serde(default = "default_strike_step")]
    pub strike_step: f64,

    /// Fixed order quantity in units.
    #[serde(default = "default_order_qty")]
    pub order_qty: u32,

    /// Broker product type (e.g. "MIS" for intraday).
    #[serde(default = "default_product")]
    pub product: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            trading_mode: TradingMode::Paper,
            exit_scope: ExitScope::AllPositions,
            universe_csv: default_universe_csv(),
            min_bars: default_min_bars(),
            history_days: default_history_days(),
            bar_interval: default_bar_interval(),
            tz_offset_minutes: default_tz_offset_minutes(),
            session_start: default_session_start(),
            scan_interval_secs: default_scan_interval_secs(),
            exchange: default_exchange(),
            underlying: default_underlying(),
            spot_symbol: default_spot_symbol(),
            strike_step: default_strike_step(),
            order_qty: default_order_qty(),
            product: default_product(),
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
            trading_mode = %config.trading_mode,
            universe_csv = %config.universe_csv,
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

    /// The session-start filter as a time of day. Falls back to 10:00 with a
    /// warning when the configured string does not parse.
    pub fn session_start_time(&self) -> NaiveTime {
        match NaiveTime::parse_from_str(&self.session_start, "%H:%M") {
            Ok(t) => t,
            Err(e) => {
                warn!(
                    session_start = %self.session_start,
                    error = %e,
                    "invalid session_start — falling back to 10:00"
                );
                NaiveTime::from_hms_opt(10, 0, 0).expect("valid fallback time")
            }
        }
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
        assert_eq!(cfg.trading_mode, TradingMode::Paper);
        assert_eq!(cfg.exit_scope, ExitScope::AllPositions);
        assert_eq!(cfg.min_bars, 160);
        assert_eq!(cfg.order_qty, 50);
        assert_eq!(cfg.strike_step, 50.0);
        assert_eq!(cfg.exchange, "NFO");
        assert_eq!(cfg.underlying, "NIFTY");
        assert_eq!(cfg.spot_symbol, "NSE:NIFTY 50");
        assert_eq!(cfg.product, "MIS");
        assert_eq!(cfg.history_days, 5);
        assert_eq!(cfg.bar_interval, "5m");
        assert_eq!(cfg.tz_offset_minutes, 330);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.trading_mode, TradingMode::Paper);
        assert_eq!(cfg.min_bars, 160);
        assert_eq!(cfg.scan_interval_secs, 300);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "trading_mode": "Live", "order_qty": 75 }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.trading_mode, TradingMode::Live);
        assert_eq!(cfg.order_qty, 75);
        assert_eq!(cfg.exchange, "NFO");
        assert_eq!(cfg.exit_scope, ExitScope::AllPositions);
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = RuntimeConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: RuntimeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.trading_mode, cfg2.trading_mode);
        assert_eq!(cfg.universe_csv, cfg2.universe_csv);
        assert_eq!(cfg.order_qty, cfg2.order_qty);
        assert_eq!(cfg.session_start, cfg2.session_start);
    }

    #[test]
    fn session_start_parses() {
        let cfg = RuntimeConfig::default();
        assert_eq!(
            cfg.session_start_time(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap()
        );

        let mut odd = RuntimeConfig::default();
        odd.session_start = "09:30".to_string();
        assert_eq!(
            odd.session_start_time(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
    }

    #[test]
    fn session_start_falls_back_on_garbage() {
        let mut cfg = RuntimeConfig::default();
        cfg.session_start = "noon-ish".to_string();
        assert_eq!(
            cfg.session_start_time(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap()
        );
    }
}
