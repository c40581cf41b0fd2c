// =============================================================================
// REST API Endpoints — Axum 0.8
// =============================================================================
//
// All endpoints live under `/api/v1/`. The health endpoint is public; every
// other endpoint requires a valid Bearer token checked via the `AuthBearer`
// extractor.
//
// The two signal views mirror the dashboard tabs: CALL candidates are rows
// where the call entry rule fired and the call exit rule has not, PUT
// likewise. Both render the restricted column set only.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::auth::AuthBearer;
use crate::app_state::AppState;
use crate::scanner::TaggedRow;
use crate::types::TradingMode;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        // ── Authenticated ───────────────────────────────────────────
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/signals/call", get(call_signals))
        .route("/api/v1/signals/put", get(put_signals))
        .route("/api/v1/positions", get(positions))
        .route("/api/v1/control/trading-mode", post(control_trading_mode))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Signal view rows
// =============================================================================

/// The restricted column set rendered by the dashboard signal tables.
#[derive(Debug, Clone, Serialize)]
pub struct SignalViewRow {
    #[serde(rename = "Stock")]
    pub stock: String,
    #[serde(rename = "Datetime")]
    pub datetime: String,
    #[serde(rename = "BB60")]
    pub bb60: Option<f64>,
    #[serde(rename = "RSI20")]
    pub rsi20: Option<f64>,
    #[serde(rename = "WILLR28")]
    pub willr28: Option<f64>,
    #[serde(rename = "+DI6")]
    pub plus_di6: Option<f64>,
    #[serde(rename = "-DI6")]
    pub minus_di6: Option<f64>,
    #[serde(rename = "+DI20")]
    pub plus_di20: Option<f64>,
    #[serde(rename = "-DI20")]
    pub minus_di20: Option<f64>,
}

impl From<&TaggedRow> for SignalViewRow {
    fn from(tagged: &TaggedRow) -> Self {
        let ind = &tagged.row.indicators;
        Self {
            stock: tagged.stock.clone(),
            datetime: ind.bar.ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            bb60: ind.bb60,
            rsi20: ind.rsi20,
            willr28: ind.willr28,
            plus_di6: ind.plus_di6,
            minus_di6: ind.minus_di6,
            plus_di20: ind.plus_di20,
            minus_di20: ind.minus_di20,
        }
    }
}

/// Rows where `entry` fired and the matching `exit` has not.
fn view_rows(state: &AppState, want_call: bool) -> Vec<SignalViewRow> {
    let scan = state.last_scan.read();
    let Some(scan) = scan.as_ref() else {
        return Vec::new();
    };

    scan.rows
        .iter()
        .filter(|r| {
            let f = &r.row.flags;
            if want_call {
                f.call_entry && !f.call_exit
            } else {
                f.put_entry && !f.put_exit
            }
        })
        .map(SignalViewRow::from)
        .collect()
}

// =============================================================================
// Handlers
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    Json(resp)
}

async fn full_state(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_summary())
}

async fn call_signals(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(view_rows(&state, true))
}

async fn put_signals(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(view_rows(&state, false))
}

async fn positions(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.router.open_positions().await {
        Ok(positions) => Json(positions).into_response(),
        Err(e) => {
            warn!(error = %e, "positions lookup failed");
            let body = serde_json::json!({ "error": format!("{e:#}") });
            (StatusCode::BAD_GATEWAY, Json(body)).into_response()
        }
    }
}

#[derive(Deserialize)]
struct TradingModeRequest {
    mode: TradingMode,
}

async fn control_trading_mode(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<TradingModeRequest>,
) -> impl IntoResponse {
    {
        let mut config = state.runtime_config.write();
        config.trading_mode = req.mode;
    }
    state.increment_version();

    match req.mode {
        TradingMode::Live => warn!("trading mode switched to LIVE — orders will reach the broker"),
        TradingMode::Paper => info!("trading mode switched to Paper"),
    }

    Json(serde_json::json!({ "trading_mode": req.mode }))
}
