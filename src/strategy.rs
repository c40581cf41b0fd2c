// =============================================================================
// Strategy — indicator pipeline and CALL/PUT threshold rules
// =============================================================================
//
// Pipeline per symbol:
//   1. Compute the full indicator set over the bar series (band widths at
//      60/105/150, RSI 20, Williams %R 28, ±DI at 6 and 20, SMA 8).
//   2. Evaluate the four boolean signals per bar.
//
// Every bar is evaluated independently — there is no position state in here,
// and exit flags are recomputed per bar, not per open trade. An undefined
// indicator (window not yet filled) makes any rule that reads it false; it
// never errors.
// =============================================================================

use serde::Serialize;

use crate::indicators::bollinger::band_width_pct;
use crate::indicators::dmi::dmi_series;
use crate::indicators::rsi::rsi_series;
use crate::indicators::sma::sma_series;
use crate::indicators::williams_r::williams_r_series;
use crate::market_data::Bar;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A bar augmented with the computed indicator set.
///
/// Fields are `None` until the corresponding window has enough history.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorRow {
    pub bar: Bar,
    pub bb60: Option<f64>,
    pub bb105: Option<f64>,
    pub bb150: Option<f64>,
    pub rsi20: Option<f64>,
    pub willr28: Option<f64>,
    pub plus_di6: Option<f64>,
    pub minus_di6: Option<f64>,
    pub plus_di20: Option<f64>,
    pub minus_di20: Option<f64>,
    pub ma8: Option<f64>,
}

/// The four per-bar signal booleans. Mutually independent; CALL and PUT
/// entries are disjoint by threshold construction (their RSI bands do not
/// overlap) but nothing here enforces that.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SignalFlags {
    pub call_entry: bool,
    pub put_entry: bool,
    pub call_exit: bool,
    pub put_exit: bool,
}

/// An indicator row with its evaluated signals.
#[derive(Debug, Clone, Serialize)]
pub struct SignalRow {
    #[serde(flatten)]
    pub indicators: IndicatorRow,
    #[serde(flatten)]
    pub flags: SignalFlags,
}

// ---------------------------------------------------------------------------
// Indicator pipeline
// ---------------------------------------------------------------------------

/// Compute the full indicator set over `bars`.
///
/// Output has one row per input bar; leading rows carry `None` until each
/// window's minimum period is satisfied. Pure function of the input series.
pub fn compute_indicator_rows(bars: &[Bar]) -> Vec<IndicatorRow> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();

    let bb60 = band_width_pct(&closes, 60, 2.0);
    let bb105 = band_width_pct(&closes, 105, 2.0);
    let bb150 = band_width_pct(&closes, 150, 2.0);
    let rsi20 = rsi_series(&closes, 20);
    let willr28 = williams_r_series(&highs, &lows, &closes, 28);
    let dmi6 = dmi_series(bars, 6);
    let dmi20 = dmi_series(bars, 20);
    let ma8 = sma_series(&closes, 8);

    bars.iter()
        .enumerate()
        .map(|(i, bar)| IndicatorRow {
            bar: bar.clone(),
            bb60: bb60[i],
            bb105: bb105[i],
            bb150: bb150[i],
            rsi20: rsi20[i],
            willr28: willr28[i],
            plus_di6: dmi6.plus[i],
            minus_di6: dmi6.minus[i],
            plus_di20: dmi20.plus[i],
            minus_di20: dmi20.minus[i],
            ma8: ma8[i],
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Signal rules
// ---------------------------------------------------------------------------

fn ge(value: Option<f64>, threshold: f64) -> bool {
    value.map_or(false, |v| v >= threshold)
}

fn le(value: Option<f64>, threshold: f64) -> bool {
    value.map_or(false, |v| v <= threshold)
}

fn between(value: Option<f64>, lo: f64, hi: f64) -> bool {
    value.map_or(false, |v| v >= lo && v <= hi)
}

/// Evaluate the four signal booleans for one row.
pub fn evaluate(row: &IndicatorRow) -> SignalFlags {
    let call_entry = le(row.bb60, 35.0)
        && between(row.rsi20, 65.0, 100.0)
        && between(row.willr28, -20.0, 0.0)
        && ge(row.plus_di6, 40.0)
        && le(row.minus_di6, 12.0)
        && ge(row.plus_di20, 35.0)
        && le(row.minus_di20, 15.0);

    let put_entry = le(row.bb60, 35.0)
        && between(row.rsi20, 1.0, 40.0)
        && between(row.willr28, -100.0, -80.0)
        && ge(row.minus_di6, 35.0)
        && le(row.plus_di6, 15.0)
        && ge(row.minus_di20, 30.0)
        && le(row.plus_di20, 15.0);

    let di_split = match (row.plus_di20, row.minus_di20) {
        (Some(p), Some(m)) => Some((p - m).abs()),
        _ => None,
    };
    let di_converged = di_split.map_or(false, |d| d < 10.0);

    let call_exit = di_converged || row.ma8.map_or(false, |m| row.bar.close < m);
    let put_exit = di_converged || row.ma8.map_or(false, |m| row.bar.close > m);

    SignalFlags {
        call_entry,
        put_entry,
        call_exit,
        put_exit,
    }
}

/// Run the full pipeline: indicators, then signals, for every bar.
pub fn evaluate_series(bars: &[Bar]) -> Vec<SignalRow> {
    compute_indicator_rows(bars)
        .into_iter()
        .map(|indicators| {
            let flags = evaluate(&indicators);
            SignalRow { indicators, flags }
        })
        .collect()
}
