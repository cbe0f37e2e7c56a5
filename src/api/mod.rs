// Exchange collaborators consumed by the trading core
pub mod binance;
pub mod paper;

pub use binance::{BinanceClient, BinanceCredentials, BinanceSpotAccount};
pub use paper::PaperExchange;

use async_trait::async_trait;
use std::sync::Arc;

use crate::models::{BuyFill, Candle, InstrumentConstraints, SellFill};
use crate::Result;

/// Market data for the traded instrument
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Most recent `limit` candles, oldest first. The last one may still be forming.
    async fn fetch_recent_candles(&self, limit: usize) -> Result<Vec<Candle>>;

    /// Latest traded price
    async fn fetch_reference_price(&self) -> Result<f64>;

    /// Lot size and minimum order value
    async fn instrument_constraints(&self) -> Result<InstrumentConstraints>;
}

/// Account queries and immediate full-fill market orders
#[async_trait]
pub trait OrderExecution: Send + Sync {
    async fn fetch_available_balance(&self, asset: &str) -> Result<f64>;

    async fn submit_market_buy(&self, quantity: f64) -> Result<BuyFill>;

    async fn submit_market_sell(&self, quantity: f64) -> Result<SellFill>;
}

#[async_trait]
impl<T: MarketData + ?Sized> MarketData for Arc<T> {
    async fn fetch_recent_candles(&self, limit: usize) -> Result<Vec<Candle>> {
        (**self).fetch_recent_candles(limit).await
    }

    async fn fetch_reference_price(&self) -> Result<f64> {
        (**self).fetch_reference_price().await
    }

    async fn instrument_constraints(&self) -> Result<InstrumentConstraints> {
        (**self).instrument_constraints().await
    }
}

#[async_trait]
impl<T: OrderExecution + ?Sized> OrderExecution for Arc<T> {
    async fn fetch_available_balance(&self, asset: &str) -> Result<f64> {
        (**self).fetch_available_balance(asset).await
    }

    async fn submit_market_buy(&self, quantity: f64) -> Result<BuyFill> {
        (**self).submit_market_buy(quantity).await
    }

    async fn submit_market_sell(&self, quantity: f64) -> Result<SellFill> {
        (**self).submit_market_sell(quantity).await
    }
}
