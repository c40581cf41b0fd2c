// =============================================================================
// Central Application State
// =============================================================================
//
// Ties the runtime config, the latest scan result, the order router, and the
// error log together for the scan loop and the dashboard API.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for mutable shared collections.
//   - Arc wrappers for subsystems with their own interior mutability.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::router::OrderRouter;
use crate::runtime_config::RuntimeConfig;
use crate::scanner::ScanResult;

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// A recorded error event for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Central application state shared across tasks via `Arc<AppState>`.
pub struct AppState {
    /// Monotonically increasing version counter, incremented on every
    /// meaningful state mutation. The dashboard polls it to detect changes.
    pub state_version: AtomicU64,

    pub runtime_config: Arc<RwLock<RuntimeConfig>>,
    pub router: Arc<OrderRouter>,

    /// The most recent completed scan, if any.
    pub last_scan: RwLock<Option<ScanResult>>,

    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    /// Instant when the engine was started. Used for uptime calculations.
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(runtime_config: Arc<RwLock<RuntimeConfig>>, router: Arc<OrderRouter>) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            runtime_config,
            router,
            last_scan: RwLock::new(None),
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Scan results ────────────────────────────────────────────────────

    /// Store a completed scan and bump the version.
    pub fn store_scan(&self, result: ScanResult) {
        *self.last_scan.write() = Some(result);
        self.increment_version();
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error message. The ring buffer is capped at
    /// [`MAX_RECENT_ERRORS`]; oldest entries are evicted first.
    pub fn push_error(&self, msg: String) {
        let record = ErrorRecord {
            message: msg,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }

        self.increment_version();
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Build the engine-status payload served by `GET /api/v1/state`.
    pub fn build_summary(&self) -> StateSummary {
        let config = self.runtime_config.read();
        let scan = self.last_scan.read();

        StateSummary {
            state_version: self.current_state_version(),
            server_time: Utc::now().timestamp_millis(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            trading_mode: config.trading_mode.to_string(),
            exit_scope: config.exit_scope.to_string(),
            scan_interval_secs: config.scan_interval_secs,
            last_scan_at: scan.as_ref().map(|s| s.scanned_at.to_rfc3339()),
            signal_rows: scan.as_ref().map(|s| s.rows.len()).unwrap_or(0),
            symbols_scanned: scan.as_ref().map(|s| s.symbols_scanned).unwrap_or(0),
            symbols_skipped: scan.as_ref().map(|s| s.symbols_skipped).unwrap_or(0),
            recent_errors: self.recent_errors.read().clone(),
        }
    }
}

/// Engine status snapshot for the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct StateSummary {
    pub state_version: u64,
    pub server_time: i64,
    pub uptime_secs: u64,
    pub trading_mode: String,
    pub exit_scope: String,
    pub scan_interval_secs: u64,
    pub last_scan_at: Option<String>,
    pub signal_rows: usize,
    pub symbols_scanned: usize,
    pub symbols_skipped: usize,
    pub recent_errors: Vec<ErrorRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{InstrumentCache, KiteClient};
    use crate::paper_book::PaperBook;

    fn state() -> AppState {
        let config = Arc::new(RwLock::new(RuntimeConfig::default()));
        let router = Arc::new(OrderRouter::new(
            Arc::new(KiteClient::new("key", "token")),
            Arc::new(InstrumentCache::new("NFO")),
            Arc::new(PaperBook::new()),
            config.clone(),
        ));
        AppState::new(config, router)
    }

    #[test]
    fn error_ring_buffer_is_capped() {
        let state = state();
        for i in 0..60 {
            state.push_error(format!("error {i}"));
        }
        let errors = state.recent_errors.read();
        assert_eq!(errors.len(), MAX_RECENT_ERRORS);
        assert_eq!(errors.first().unwrap().message, "error 10");
    }

    #[test]
    fn version_bumps_on_mutation() {
        let state = state();
        let v0 = state.current_state_version();
        state.push_error("boom".to_string());
        assert!(state.current_state_version() > v0);
    }

    #[test]
    fn summary_reflects_empty_state() {
        let state = state();
        let summary = state.build_summary();
        assert_eq!(summary.trading_mode, "Paper");
        assert_eq!(summary.signal_rows, 0);
        assert!(summary.last_scan_at.is_none());
    }
}
