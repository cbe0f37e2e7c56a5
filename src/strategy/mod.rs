// Trading strategy module
pub mod pivot_reversal;
pub mod signals;

pub use pivot_reversal::PivotReversalStrategy;

use crate::models::{Candle, Signal};

/// Base trait for entry strategies
pub trait Strategy: Send + Sync {
    /// Decide whether to enter given the latest candle window.
    ///
    /// Called every cycle; strategies must return `Signal::Hold` while a position
    /// is open since only one position may exist at a time.
    fn generate_signal(&self, candles: &[Candle], in_position: bool) -> Signal;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum candles required before the strategy can ever emit `Enter`
    fn min_candles_required(&self) -> usize;
}
