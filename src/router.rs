// =============================================================================
// Order Router — ATM resolution, paper/live entries and exits
// =============================================================================
//
// In **paper mode** orders are simulated: the contract is still resolved from
// the cached instrument universe (so paper runs exercise the same resolution
// path as live ones), but nothing is submitted and fills are recorded in the
// local paper book.
//
// In **live mode** entries and exits go to the broker as market orders for
// the configured fixed quantity. There is no retry and no idempotency key; a
// transport failure surfaces to the caller with the order state unknown.
// =============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::broker::instruments::resolve_atm;
use crate::broker::{InstrumentCache, KiteClient};
use crate::paper_book::PaperBook;
use crate::runtime_config::RuntimeConfig;
use crate::types::{ExitScope, OptionSide, TradingMode};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Outcome of an entry attempt.
#[derive(Debug, Clone, Serialize)]
pub struct OrderResult {
    pub mode: TradingMode,
    pub tradingsymbol: String,
    /// Broker order id — live mode only.
    pub order_id: Option<String>,
}

/// A currently open position, unified across paper book and broker book.
#[derive(Debug, Clone, Serialize)]
pub struct OpenPosition {
    pub tradingsymbol: String,
    /// "CE", "PE", or "" when it cannot be inferred.
    pub instrument_type: String,
    pub quantity: i64,
}

/// Pick the positions an exit signal should close.
///
/// Zero-quantity legs never qualify. `AllPositions` closes everything else —
/// the original behavior of this strategy, where any exit signal flattens the
/// whole book. `MatchingSide` keeps only positions whose instrument type
/// matches the side whose exit rule fired.
pub fn select_exits(
    positions: &[OpenPosition],
    scope: ExitScope,
    side: OptionSide,
) -> Vec<OpenPosition> {
    positions
        .iter()
        .filter(|p| p.quantity != 0)
        .filter(|p| match scope {
            ExitScope::AllPositions => true,
            ExitScope::MatchingSide => p.instrument_type == side.instrument_type(),
        })
        .cloned()
        .collect()
}

/// Infer "CE"/"PE" from a derivatives trading symbol.
fn instrument_type_of(tradingsymbol: &str) -> String {
    if tradingsymbol.ends_with("CE") {
        "CE".to_string()
    } else if tradingsymbol.ends_with("PE") {
        "PE".to_string()
    } else {
        String::new()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Routes entries and exits through the broker client (live) or the paper
/// book (paper), resolving contracts against the owned instrument cache.
pub struct OrderRouter {
    client: Arc<KiteClient>,
    instruments: Arc<InstrumentCache>,
    paper_book: Arc<PaperBook>,
    config: Arc<RwLock<RuntimeConfig>>,
}

impl OrderRouter {
    pub fn new(
        client: Arc<KiteClient>,
        instruments: Arc<InstrumentCache>,
        paper_book: Arc<PaperBook>,
        config: Arc<RwLock<RuntimeConfig>>,
    ) -> Self {
        Self {
            client,
            instruments,
            paper_book,
            config,
        }
    }

    /// Today's date in exchange-local time.
    fn local_today(&self) -> NaiveDate {
        let offset = Duration::minutes(self.config.read().tz_offset_minutes as i64);
        (Utc::now().naive_utc() + offset).date()
    }

    /// Cached instrument universe, refreshed when stale (empty or past its
    /// nearest cached expiry).
    async fn universe(&self) -> Result<Vec<crate::broker::Instrument>> {
        let (underlying, exchange) = {
            let cfg = self.config.read();
            (cfg.underlying.clone(), cfg.exchange.clone())
        };
        let today = self.local_today();

        if self.instruments.is_stale(&underlying, today) {
            info!(exchange = %exchange, "instrument cache stale — refreshing");
            let fresh = self
                .client
                .instruments(&exchange)
                .await
                .context("instrument dump refresh failed")?;
            self.instruments.install(fresh);
        }

        self.instruments
            .snapshot()
            .context("instrument cache empty after refresh")
    }

    // -------------------------------------------------------------------------
    // Entries
    // -------------------------------------------------------------------------

    /// Resolve the ATM contract for `side` at the live spot price and buy it.
    pub async fn place_entry(&self, side: OptionSide) -> Result<OrderResult> {
        let spot_symbol = self.config.read().spot_symbol.clone();
        let spot = self
            .client
            .ltp(&spot_symbol)
            .await
            .context("spot price lookup failed")?;
        self.place_entry_at(side, spot).await
    }

    /// Resolve and buy the ATM contract for `side` at the given spot price.
    pub async fn place_entry_at(&self, side: OptionSide, spot: f64) -> Result<OrderResult> {
        let (mode, underlying, exchange, strike_step, qty, product) = {
            let cfg = self.config.read();
            (
                cfg.trading_mode,
                cfg.underlying.clone(),
                cfg.exchange.clone(),
                cfg.strike_step,
                cfg.order_qty,
                cfg.product.clone(),
            )
        };

        let universe = self.universe().await?;
        let instrument = resolve_atm(
            &universe,
            &underlying,
            side,
            spot,
            strike_step,
            self.local_today(),
        )?;

        match mode {
            TradingMode::Paper => {
                let sim_id = Uuid::new_v4().to_string();
                self.paper_book.open_position(
                    &instrument.tradingsymbol,
                    &instrument.instrument_type,
                    qty as i64,
                );
                info!(
                    side = %side,
                    tradingsymbol = %instrument.tradingsymbol,
                    sim_order_id = %sim_id,
                    "PAPER ENTRY"
                );
                Ok(OrderResult {
                    mode,
                    tradingsymbol: instrument.tradingsymbol,
                    order_id: None,
                })
            }
            TradingMode::Live => {
                let order_id = self
                    .client
                    .place_market_order(&exchange, &instrument.tradingsymbol, "BUY", qty, &product)
                    .await
                    .context("entry order placement failed")?;
                info!(
                    side = %side,
                    tradingsymbol = %instrument.tradingsymbol,
                    order_id = %order_id,
                    "LIVE ENTRY"
                );
                Ok(OrderResult {
                    mode,
                    tradingsymbol: instrument.tradingsymbol,
                    order_id: Some(order_id),
                })
            }
        }
    }

    // -------------------------------------------------------------------------
    // Exits
    // -------------------------------------------------------------------------

    /// Sell out of one position (market order in live mode, book entry in
    /// paper mode).
    pub async fn exit_position(&self, tradingsymbol: &str, quantity: i64) -> Result<()> {
        let (mode, exchange, product) = {
            let cfg = self.config.read();
            (cfg.trading_mode, cfg.exchange.clone(), cfg.product.clone())
        };

        match mode {
            TradingMode::Paper => {
                self.paper_book.close_symbol(tradingsymbol);
                info!(tradingsymbol, "PAPER EXIT");
                Ok(())
            }
            TradingMode::Live => {
                self.client
                    .place_market_order(
                        &exchange,
                        tradingsymbol,
                        "SELL",
                        quantity.unsigned_abs() as u32,
                        &product,
                    )
                    .await
                    .context("exit order placement failed")?;
                info!(tradingsymbol, "LIVE EXIT");
                Ok(())
            }
        }
    }

    /// All currently open positions with the book appropriate to the mode.
    pub async fn open_positions(&self) -> Result<Vec<OpenPosition>> {
        let mode = self.config.read().trading_mode;
        match mode {
            TradingMode::Paper => Ok(self
                .paper_book
                .open_positions()
                .into_iter()
                .map(|p| OpenPosition {
                    tradingsymbol: p.tradingsymbol,
                    instrument_type: p.instrument_type,
                    quantity: p.quantity,
                })
                .collect()),
            TradingMode::Live => {
                let net = self
                    .client
                    .net_positions()
                    .await
                    .context("positions lookup failed")?;
                Ok(net
                    .into_iter()
                    .filter(|p| p.quantity != 0)
                    .map(|p| OpenPosition {
                        instrument_type: instrument_type_of(&p.tradingsymbol),
                        tradingsymbol: p.tradingsymbol,
                        quantity: p.quantity,
                    })
                    .collect())
            }
        }
    }

    /// Whether any position is currently open.
    pub async fn has_open_position(&self) -> Result<bool> {
        Ok(!self.open_positions().await?.is_empty())
    }

    /// Close open positions in response to an exit signal.
    ///
    /// `side` identifies which exit rule fired; whether it narrows the exit
    /// set depends on the configured [`ExitScope`]. Returns how many
    /// positions were exited.
    pub async fn auto_exit(&self, exit_signal: bool, side: OptionSide) -> Result<usize> {
        if !exit_signal {
            return Ok(0);
        }

        let scope = self.config.read().exit_scope;
        let positions = self.open_positions().await?;
        let to_exit = select_exits(&positions, scope, side);

        if to_exit.is_empty() {
            return Ok(0);
        }

        info!(count = to_exit.len(), scope = %scope, side = %side, "auto-exit triggered");

        let mut exited = 0usize;
        for pos in &to_exit {
            match self.exit_position(&pos.tradingsymbol, pos.quantity).await {
                Ok(()) => exited += 1,
                Err(e) => {
                    warn!(
                        tradingsymbol = %pos.tradingsymbol,
                        error = %e,
                        "auto-exit failed for position"
                    );
                }
            }
        }
        Ok(exited)
    }
}

impl std::fmt::Debug for OrderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderRouter")
            .field("client", &"<KiteClient>")
            .field("instruments", &self.instruments)
            .field("paper_book", &self.paper_book)
            .finish()
    }
}
