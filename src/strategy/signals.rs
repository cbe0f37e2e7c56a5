use crate::error::BotError;
use crate::models::Candle;

/// Validate a fetched candle series before any signal is computed.
///
/// Timestamps must be strictly increasing and prices non-negative. A series
/// that fails is treated as unavailable data for this cycle.
pub fn validate_candle_series(candles: &[Candle]) -> Result<(), BotError> {
    for window in candles.windows(2) {
        if window[1].timestamp <= window[0].timestamp {
            return Err(BotError::DataUnavailable(format!(
                "candle timestamps not strictly increasing: {} followed by {}",
                window[0].timestamp.format("%Y-%m-%d %H:%M:%S"),
                window[1].timestamp.format("%Y-%m-%d %H:%M:%S")
            )));
        }
    }

    if let Some(bad) = candles.iter().find(|c| {
        c.open < 0.0 || c.high < 0.0 || c.low < 0.0 || c.close < 0.0 || c.volume < 0.0
    }) {
        return Err(BotError::DataUnavailable(format!(
            "negative value in candle at {}",
            bad.timestamp
        )));
    }

    Ok(())
}
