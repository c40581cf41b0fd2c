// =============================================================================
// Simple Moving Average
// =============================================================================

/// Compute the SMA series of `values` over `period`.
///
/// The result has one entry per input value; the first `period - 1` entries
/// are `None`.
pub fn sma_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    for (i, window) in values.windows(period).enumerate() {
        let mean = window.iter().sum::<f64>() / period as f64;
        if mean.is_finite() {
            out[i + period - 1] = Some(mean);
        }
    }

    out
}
