// =============================================================================
// Bollinger Band Width
// =============================================================================
//
// Bands are SMA ± k·σ over the window (population standard deviation). The
// strategy consumes only the band width normalised by the bar's close:
//
//   width% = (upper - lower) / close * 100 = 2·k·σ / close * 100

/// Compute the band-width-percent series of `closes` over `period` with
/// `num_std` standard deviations per band.
///
/// Entries are `None` until the window fills, and for bars with a zero close
/// (degenerate input — the normalisation is undefined there).
pub fn band_width_pct(closes: &[f64], period: usize, num_std: f64) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period {
        return out;
    }

    for (i, window) in closes.windows(period).enumerate() {
        let idx = i + period - 1;
        let close = closes[idx];
        if close == 0.0 {
            continue;
        }

        let mean = window.iter().sum::<f64>() / period as f64;
        let variance =
            window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
        let width = (2.0 * num_std * variance.sqrt() / close) * 100.0;

        if width.is_finite() {
            out[idx] = Some(width);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_flat_series_is_zero() {
        let closes = vec![100.0; 30];
        let out = band_width_pct(&closes, 20, 2.0);
        assert!(out[18].is_none());
        assert!((out[19].unwrap()).abs() < 1e-10);
        assert!((out[29].unwrap()).abs() < 1e-10);
    }

    #[test]
    fn width_known_window() {
        // Window [98, 100, 102]: mean 100, σ = sqrt(8/3).
        // width% = 4σ / 102 * 100.
        let closes = vec![98.0, 100.0, 102.0];
        let out = band_width_pct(&closes, 3, 2.0);
        let sigma = (8.0f64 / 3.0).sqrt();
        let expected = 4.0 * sigma / 102.0 * 100.0;
        assert!((out[2].unwrap() - expected).abs() < 1e-10);
    }

    #[test]
    fn width_insufficient_data() {
        let out = band_width_pct(&[1.0, 2.0, 3.0], 20, 2.0);
        assert!(out.iter().all(Option::is_none));
    }

    #[test]
    fn width_alignment() {
        let closes: Vec<f64> = (1..=80).map(|x| x as f64).collect();
        let out = band_width_pct(&closes, 60, 2.0);
        assert_eq!(out.len(), 80);
        assert_eq!(out.iter().filter(|v| v.is_none()).count(), 59);
        assert!(out[59].is_some());
    }

    #[test]
    fn width_zero_close_is_undefined() {
        let closes = vec![1.0, 2.0, 0.0, 2.0];
        let out = band_width_pct(&closes, 3, 2.0);
        assert!(out[2].is_none());
        assert!(out[3].is_some());
    }
}
