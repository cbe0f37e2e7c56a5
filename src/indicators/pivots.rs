use crate::models::Candle;

/// Pivot low/high flags, parallel to the candle series they were computed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotFlags {
    pub is_low: Vec<bool>,
    pub is_high: Vec<bool>,
}

impl PivotFlags {
    pub fn len(&self) -> usize {
        self.is_low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_low.is_empty()
    }
}

/// Detect pivot lows and highs over a symmetric window of radius `lookback`
///
/// A candle at index `i` is a pivot low when its low equals the minimum low of
/// the `2 * lookback + 1` candles centered on it (ties count). Pivot highs are the
/// mirror image on highs.
///
/// A pivot can only be confirmed once `lookback` candles after it exist, so the
/// first and last `lookback` entries are never flagged.
pub fn detect_pivots(candles: &[Candle], lookback: usize) -> PivotFlags {
    let n = candles.len();
    let mut is_low = vec![false; n];
    let mut is_high = vec![false; n];

    if n < 2 * lookback + 1 {
        return PivotFlags { is_low, is_high };
    }

    for i in lookback..n - lookback {
        let window = &candles[i - lookback..=i + lookback];

        let window_low = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let window_high = window
            .iter()
            .map(|c| c.high)
            .fold(f64::NEG_INFINITY, f64::max);

        is_low[i] = candles[i].low == window_low;
        is_high[i] = candles[i].high == window_high;
    }

    PivotFlags { is_low, is_high }
}
