// =============================================================================
// Williams %R
// =============================================================================
//
//   %R = (highest_high - close) / (highest_high - lowest_low) * -100
//
// over a trailing lookback window. Values live in [-100, 0]: 0 means the
// close sits at the window high, -100 at the window low.

/// Compute the Williams %R series over `period` bars, aligned with the input.
///
/// The first `period - 1` entries are `None`, as is any bar whose window has
/// a degenerate (zero) high-low range.
pub fn williams_r_series(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut out = vec![None; n];
    if period == 0 || n < period || highs.len() != n || lows.len() != n {
        return out;
    }

    for idx in (period - 1)..n {
        let start = idx + 1 - period;
        let hh = highs[start..=idx]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let ll = lows[start..=idx].iter().copied().fold(f64::INFINITY, f64::min);

        let range = hh - ll;
        if range == 0.0 {
            continue;
        }

        let wr = (hh - closes[idx]) / range * -100.0;
        if wr.is_finite() {
            out[idx] = Some(wr);
        }
    }

    out
}
