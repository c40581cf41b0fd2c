// =============================================================================
// Directional Movement Index (+DI / -DI)
// =============================================================================
//
// Calculation pipeline:
//   1. Compute +DM (positive directional movement) and -DM per bar.
//   2. Compute True Range (TR) per bar.
//   3. Apply Wilder's smoothing (period) to +DM, -DM, and TR.
//   4. Derive +DI = smoothed(+DM) / smoothed(TR) * 100
//            -DI = smoothed(-DM) / smoothed(TR) * 100
//
// The strategy reads the two DI lines directly (at two periods) rather than
// collapsing them into an ADX trend-strength average.
// =============================================================================

use crate::market_data::Bar;

/// Aligned +DI / -DI series for one period.
#[derive(Debug, Clone)]
pub struct DmiSeries {
    pub plus: Vec<Option<f64>>,
    pub minus: Vec<Option<f64>>,
}

/// Compute the ±DI series of `bars` over `period`, aligned with the input.
///
/// The first `period` entries are `None` (the very first bar has no
/// predecessor, and `period` bar-to-bar transitions seed the smoothing), as
/// is any bar where the smoothed true range is zero.
pub fn dmi_series(bars: &[Bar], period: usize) -> DmiSeries {
    let n = bars.len();
    let mut plus = vec![None; n];
    let mut minus = vec![None; n];
    if period == 0 || n < period + 1 {
        return DmiSeries { plus, minus };
    }

    let period_f = period as f64;

    // ------------------------------------------------------------------
    // Raw +DM, -DM, and True Range for each consecutive pair
    // ------------------------------------------------------------------
    let bar_count = n - 1; // number of bar-to-bar transitions

    let mut plus_dm = Vec::with_capacity(bar_count);
    let mut minus_dm = Vec::with_capacity(bar_count);
    let mut tr_vals = Vec::with_capacity(bar_count);

    for i in 1..n {
        let high = bars[i].high;
        let low = bars[i].low;
        let prev_high = bars[i - 1].high;
        let prev_low = bars[i - 1].low;
        let prev_close = bars[i - 1].close;

        // True Range
        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());

        // Directional Movement
        let up_move = high - prev_high;
        let down_move = prev_low - low;

        let pdm = if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        };
        let mdm = if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        };

        plus_dm.push(pdm);
        minus_dm.push(mdm);
        tr_vals.push(tr);
    }

    // ------------------------------------------------------------------
    // Wilder's smoothing, emitting DI values as the window advances
    // ------------------------------------------------------------------
    let mut smooth_plus_dm: f64 = plus_dm[..period].iter().sum();
    let mut smooth_minus_dm: f64 = minus_dm[..period].iter().sum();
    let mut smooth_tr: f64 = tr_vals[..period].iter().sum();

    // First DI lands at bar index `period` (after `period` transitions).
    if let Some((p, m)) = di_from_smoothed(smooth_plus_dm, smooth_minus_dm, smooth_tr) {
        plus[period] = Some(p);
        minus[period] = Some(m);
    }

    for i in period..bar_count {
        smooth_plus_dm = smooth_plus_dm - smooth_plus_dm / period_f + plus_dm[i];
        smooth_minus_dm = smooth_minus_dm - smooth_minus_dm / period_f + minus_dm[i];
        smooth_tr = smooth_tr - smooth_tr / period_f + tr_vals[i];

        if let Some((p, m)) = di_from_smoothed(smooth_plus_dm, smooth_minus_dm, smooth_tr) {
            plus[i + 1] = Some(p);
            minus[i + 1] = Some(m);
        }
    }

    DmiSeries { plus, minus }
}

/// Derive (+DI, -DI) from smoothed +DM, -DM, and TR values.
///
/// Returns `None` when the smoothed true range is zero or either result is
/// non-finite.
fn di_from_smoothed(
    smooth_plus_dm: f64,
    smooth_minus_dm: f64,
    smooth_tr: f64,
) -> Option<(f64, f64)> {
    if smooth_tr == 0.0 {
        return None;
    }

    let plus_di = (smooth_plus_dm / smooth_tr) * 100.0;
    let minus_di = (smooth_minus_dm / smooth_tr) * 100.0;

    if plus_di.is_finite() && minus_di.is_finite() {
        Some((plus_di, minus_di))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    /// Build a simple bar for testing. Volume and timestamps are irrelevant
    /// for the DMI calculation so we use a fixed date plus a minute counter.
    fn bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            ts: NaiveDate::from_ymd_opt(2026, 8, 7)
                .unwrap()
                .and_hms_opt(9, 15, 0)
                .unwrap()
                + chrono::Duration::minutes(5 * i as i64),
            open,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn dmi_period_zero() {
        let bars: Vec<Bar> = (0..30).map(|i| bar(i, 1.0, 2.0, 0.5, 1.5)).collect();
        let out = dmi_series(&bars, 0);
        assert!(out.plus.iter().all(Option::is_none));
        assert!(out.minus.iter().all(Option::is_none));
    }

    #[test]
    fn dmi_insufficient_data() {
        let bars: Vec<Bar> = (0..6).map(|i| bar(i, 1.0, 2.0, 0.5, 1.5)).collect();
        let out = dmi_series(&bars, 6);
        assert!(out.plus.iter().all(Option::is_none));
    }

    #[test]
    fn dmi_alignment() {
        let bars: Vec<Bar> = (0..40)
            .map(|i| {
                let base = 100.0 + i as f64;
                bar(i, base, base + 1.0, base - 0.5, base + 0.5)
            })
            .collect();
        let out = dmi_series(&bars, 20);
        assert_eq!(out.plus.len(), 40);
        assert_eq!(out.plus.iter().filter(|v| v.is_none()).count(), 20);
        assert!(out.plus[20].is_some());
        assert!(out.minus[20].is_some());
    }

    #[test]
    fn dmi_uptrend_favours_plus_di() {
        // Consecutive higher highs and higher lows.
        let bars: Vec<Bar> = (0..40)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                bar(i, base, base + 1.5, base - 0.5, base + 1.0)
            })
            .collect();
        let out = dmi_series(&bars, 6);
        let plus = out.plus.last().unwrap().unwrap();
        let minus = out.minus.last().unwrap().unwrap();
        assert!(plus > minus, "expected +DI {plus} > -DI {minus} in uptrend");
        assert!(minus < 5.0, "expected -DI near 0 in clean uptrend, got {minus}");
    }

    #[test]
    fn dmi_downtrend_favours_minus_di() {
        let bars: Vec<Bar> = (0..40)
            .map(|i| {
                let base = 200.0 - i as f64 * 2.0;
                bar(i, base, base + 0.5, base - 1.5, base - 1.0)
            })
            .collect();
        let out = dmi_series(&bars, 6);
        let plus = out.plus.last().unwrap().unwrap();
        let minus = out.minus.last().unwrap().unwrap();
        assert!(minus > plus, "expected -DI {minus} > +DI {plus} in downtrend");
    }

    #[test]
    fn dmi_result_range() {
        let bars: Vec<Bar> = (0..100)
            .map(|i| {
                let base = 50.0 + (i as f64 * 0.3).sin() * 10.0;
                bar(i, base - 0.5, base + 1.0, base - 1.0, base + 0.5)
            })
            .collect();
        let out = dmi_series(&bars, 20);
        for v in out.plus.iter().chain(out.minus.iter()).flatten() {
            assert!((0.0..=100.0).contains(v), "DI {v} out of [0,100] range");
        }
    }

    #[test]
    fn dmi_flat_market_undefined() {
        // Identical bars with zero range — TR is 0, DI undefined.
        let bars: Vec<Bar> = (0..30).map(|i| bar(i, 100.0, 100.0, 100.0, 100.0)).collect();
        let out = dmi_series(&bars, 6);
        assert!(out.plus.iter().all(Option::is_none));
        assert!(out.minus.iter().all(Option::is_none));
    }
}
