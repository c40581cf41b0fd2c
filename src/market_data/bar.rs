// =============================================================================
// OHLCV bars
// =============================================================================
//
// A `Bar` is one 5-minute OHLCV sample in exchange-local time. Series
// invariants enforced by `clean`:
//   - all price and volume fields are finite and non-negative
//   - timestamps are strictly increasing

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A single OHLCV bar for one symbol at one sampling interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar timestamp in exchange-local time.
    pub ts: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    fn is_well_formed(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

/// Drop malformed bars and enforce strictly increasing timestamps.
///
/// A bar is dropped when any price/volume field is non-finite or negative, or
/// when its timestamp does not advance past the previous kept bar (duplicate
/// feed rows).
pub fn clean(bars: Vec<Bar>) -> Vec<Bar> {
    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());

    for bar in bars {
        if !bar.is_well_formed() {
            continue;
        }
        if let Some(last) = out.last() {
            if bar.ts <= last.ts {
                continue;
            }
        }
        out.push(bar);
    }

    out
}
