// =============================================================================
// NIFTY Options Signal Engine — Main Entry Point
// =============================================================================
//
// The engine starts in Paper mode for safety regardless of what the config
// file says. Users must explicitly switch to Live mode via the API.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod broker;
mod indicators;
mod market_data;
mod paper_book;
mod router;
mod runtime_config;
mod scanner;
mod strategy;
mod types;
mod universe;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::broker::{InstrumentCache, KiteClient};
use crate::market_data::HistoryClient;
use crate::paper_book::PaperBook;
use crate::router::OrderRouter;
use crate::runtime_config::RuntimeConfig;
use crate::scanner::{latest_rows, scan_universe};
use crate::types::{OptionSide, TradingMode};

const CONFIG_PATH: &str = "runtime_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        NIFTY Options Signal Engine — Starting Up        ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    // SAFETY: Force Paper mode on startup.
    config.trading_mode = TradingMode::Paper;

    info!(
        trading_mode = %config.trading_mode,
        exit_scope = %config.exit_scope,
        scan_interval_secs = config.scan_interval_secs,
        "Engine starting in SAFE mode (Paper)"
    );

    // ── 2. Scan universe ─────────────────────────────────────────────────
    let symbols = universe::load_universe(&config.universe_csv)?;
    if symbols.is_empty() {
        anyhow::bail!("universe file {} contains no symbols", config.universe_csv);
    }
    info!(count = symbols.len(), "Configured scan universe");

    // ── 3. Clients & shared state ────────────────────────────────────────
    let api_key = std::env::var("KITE_API_KEY").unwrap_or_default();
    let access_token = std::env::var("KITE_ACCESS_TOKEN").unwrap_or_default();
    if api_key.is_empty() || access_token.is_empty() {
        warn!("KITE_API_KEY / KITE_ACCESS_TOKEN not set — broker calls will fail in Live mode");
    }

    let history = HistoryClient::new(
        config.history_days,
        &config.bar_interval,
        config.tz_offset_minutes,
    );

    let kite = Arc::new(KiteClient::new(api_key, access_token));
    let instrument_cache = Arc::new(InstrumentCache::new(config.exchange.clone()));
    let paper_book = Arc::new(PaperBook::new());
    let config = Arc::new(RwLock::new(config));

    let order_router = Arc::new(OrderRouter::new(
        kite,
        instrument_cache,
        paper_book,
        config.clone(),
    ));

    let state = Arc::new(AppState::new(config, order_router.clone()));

    // ── 4. Start the API server ──────────────────────────────────────────
    let api_state = state.clone();
    let bind_addr = std::env::var("ENGINE_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let bind_addr_clone = bind_addr.clone();

    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = tokio::net::TcpListener::bind(&bind_addr_clone)
            .await
            .expect("Failed to bind API server");
        info!(addr = %bind_addr_clone, "API server listening");
        axum::serve(listener, app).await.expect("API server failed");
    });

    // ── 5. Scan loop ─────────────────────────────────────────────────────
    // One pass fetches and evaluates every symbol sequentially, then acts on
    // the freshest bar per symbol.
    let scan_state = state.clone();
    let scan_router = order_router.clone();
    tokio::spawn(async move {
        info!("Scan loop starting");

        let interval_secs = scan_state.runtime_config.read().scan_interval_secs;
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_secs));

        loop {
            interval.tick().await;

            let (min_bars, session_start) = {
                let cfg = scan_state.runtime_config.read();
                (cfg.min_bars, cfg.session_start_time())
            };

            match scan_universe(&history, &symbols, min_bars, session_start).await {
                Ok(result) => {
                    route_signals(&scan_state, &scan_router, &result).await;
                    scan_state.store_scan(result);
                }
                Err(e) => {
                    error!(error = %e, "scan failed");
                    scan_state.push_error(format!("{e}"));
                }
            }
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 6. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    if let Err(e) = state.runtime_config.read().save(CONFIG_PATH) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("NIFTY Options Signal Engine shut down complete.");
    Ok(())
}

/// Act on the freshest bar per symbol: run auto-exits first, then place an
/// entry when a setup fired and the book is flat.
async fn route_signals(
    state: &Arc<AppState>,
    order_router: &Arc<OrderRouter>,
    result: &crate::scanner::ScanResult,
) {
    let latest = latest_rows(result);

    let call_exit = latest.iter().any(|r| r.row.flags.call_exit);
    let put_exit = latest.iter().any(|r| r.row.flags.put_exit);
    let call_setup = latest
        .iter()
        .any(|r| r.row.flags.call_entry && !r.row.flags.call_exit);
    let put_setup = latest
        .iter()
        .any(|r| r.row.flags.put_entry && !r.row.flags.put_exit);

    // ── Exits ────────────────────────────────────────────────────────
    for (signal, side) in [(call_exit, OptionSide::Call), (put_exit, OptionSide::Put)] {
        match order_router.auto_exit(signal, side).await {
            Ok(0) => {}
            Ok(count) => info!(count, side = %side, "auto-exit closed positions"),
            Err(e) => {
                error!(side = %side, error = %e, "auto-exit failed");
                state.push_error(format!("auto-exit {side}: {e:#}"));
            }
        }
    }

    // ── Entries ──────────────────────────────────────────────────────
    let entry_side = match (call_setup, put_setup) {
        (true, _) => Some(OptionSide::Call),
        (false, true) => Some(OptionSide::Put),
        _ => None,
    };

    let Some(side) = entry_side else {
        return;
    };

    match order_router.has_open_position().await {
        Ok(true) => {
            info!(side = %side, "entry signal ignored — a position is already open");
        }
        Ok(false) => match order_router.place_entry(side).await {
            Ok(result) => info!(
                side = %side,
                mode = %result.mode,
                tradingsymbol = %result.tradingsymbol,
                order_id = result.order_id.as_deref().unwrap_or("-"),
                "entry routed"
            ),
            Err(e) => {
                error!(side = %side, error = %e, "entry failed");
                state.push_error(format!("entry {side}: {e:#}"));
            }
        },
        Err(e) => {
            error!(error = %e, "open-position check failed");
            state.push_error(format!("position check: {e:#}"));
        }
    }
}
