use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OHLCV candlestick for the traded instrument.
///
/// The last candle of a freshly fetched series may still be forming.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Entry decision produced by a strategy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Signal {
    /// Open a new position
    Enter,
    /// A position is already open, entries are not considered
    Hold,
    NoSignal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

/// Exchange-imposed order limits for the instrument
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct InstrumentConstraints {
    /// Minimum tradable quantity increment
    pub quantity_step: f64,
    /// Minimum order value in the quote asset
    pub min_notional: f64,
}

/// Result of a filled market buy
#[derive(Debug, Clone, PartialEq)]
pub struct BuyFill {
    pub order_id: String,
    pub filled_quantity: f64,
    pub filled_price: f64,
    pub fees_paid: f64,
}

/// Result of a filled market sell
#[derive(Debug, Clone, PartialEq)]
pub struct SellFill {
    pub order_id: String,
    pub filled_price: f64,
    pub fees_paid: f64,
}

/// One row of the order record stream.
///
/// Fees here are what the exchange reported, not the ledger's fee assumption.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRecord {
    pub time: DateTime<Utc>,
    pub order_id: String,
    pub side: TradeSide,
    pub qty: f64,
    pub price: f64,
    pub fees: f64,
}
