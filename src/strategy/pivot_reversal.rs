use super::Strategy;
use crate::indicators::{detect_pivots, PivotFlags};
use crate::models::{Candle, Signal};

/// Pivot-low reclaim entry.
///
/// Looks at the last closed bar `k = N - 2`. If it is a confirmed pivot low and
/// the latest (possibly still forming) bar closes above `high[k]`, the low has
/// been defended and price reclaimed it: enter long.
#[derive(Debug, Clone)]
pub struct PivotReversalStrategy {
    lookback: usize,
}

impl PivotReversalStrategy {
    pub fn new(lookback: usize) -> Self {
        Self { lookback }
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    /// Evaluate the entry rule against precomputed pivot flags
    pub fn evaluate(&self, candles: &[Candle], pivots: &PivotFlags, in_position: bool) -> Signal {
        if in_position {
            return Signal::Hold;
        }

        let n = candles.len();
        if n < self.min_candles_required() || pivots.len() != n {
            return Signal::NoSignal;
        }

        let i = n - 1;
        let k = n - 2;

        if pivots.is_low[k] && candles[i].close > candles[k].high {
            tracing::debug!(
                pivot_time = %candles[k].timestamp,
                pivot_high = candles[k].high,
                close = candles[i].close,
                "Pivot low reclaimed"
            );
            Signal::Enter
        } else {
            Signal::NoSignal
        }
    }
}

impl Default for PivotReversalStrategy {
    fn default() -> Self {
        Self::new(7)
    }
}

impl Strategy for PivotReversalStrategy {
    fn generate_signal(&self, candles: &[Candle], in_position: bool) -> Signal {
        if in_position {
            return Signal::Hold;
        }
        let pivots = detect_pivots(candles, self.lookback);
        self.evaluate(candles, &pivots, in_position)
    }

    fn name(&self) -> &str {
        "PivotReversal"
    }

    /// `k = N - 2` can only be a confirmed pivot once `lookback` bars follow it
    /// and `lookback` bars precede it.
    fn min_candles_required(&self) -> usize {
        2 * self.lookback + 2
    }
}
