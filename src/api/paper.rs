use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{MarketData, OrderExecution};
use crate::config::BotConfig;
use crate::error::BotError;
use crate::models::{BuyFill, SellFill};
use crate::Result;

#[derive(Debug, Clone, Copy)]
struct PaperBalances {
    base: f64,
    quote: f64,
}

/// Simulated spot account filling market orders at the live reference price.
///
/// Buys fill at `price * (1 + slippage)`, sells at `price * (1 - slippage)`.
/// Each fill is charged `fee_rate` on its notional in the quote asset.
pub struct PaperExchange<M> {
    market: M,
    base_asset: String,
    quote_asset: String,
    fee_rate: f64,
    slippage: f64,
    balances: Mutex<PaperBalances>,
}

impl<M: MarketData> PaperExchange<M> {
    pub fn new(market: M, config: &BotConfig) -> Self {
        Self {
            market,
            base_asset: config.base_asset.clone(),
            quote_asset: config.quote_asset.clone(),
            fee_rate: config.strategy.fee_rate,
            slippage: config.paper.slippage_bps / 10_000.0,
            balances: Mutex::new(PaperBalances {
                base: config.paper.initial_base_balance,
                quote: config.paper.initial_quote_balance,
            }),
        }
    }

    /// Current (base, quote) balances
    pub async fn balances(&self) -> (f64, f64) {
        let b = self.balances.lock().await;
        (b.base, b.quote)
    }

    async fn execution_price(&self) -> Result<f64> {
        let price = self
            .market
            .fetch_reference_price()
            .await
            .map_err(|e| BotError::OrderRejected(format!("no price to fill at: {}", e)))?;

        if !(price > 0.0) {
            return Err(BotError::OrderRejected(format!(
                "unusable fill price {}",
                price
            )));
        }
        Ok(price)
    }
}

#[async_trait]
impl<M: MarketData> OrderExecution for PaperExchange<M> {
    async fn fetch_available_balance(&self, asset: &str) -> Result<f64> {
        let b = self.balances.lock().await;
        if asset.eq_ignore_ascii_case(&self.base_asset) {
            Ok(b.base)
        } else if asset.eq_ignore_ascii_case(&self.quote_asset) {
            Ok(b.quote)
        } else {
            Ok(0.0)
        }
    }

    async fn submit_market_buy(&self, quantity: f64) -> Result<BuyFill> {
        if !(quantity > 0.0) {
            return Err(BotError::OrderRejected(format!("bad quantity {}", quantity)));
        }

        let fill_price = self.execution_price().await? * (1.0 + self.slippage);
        let cost = quantity * fill_price;
        let fee = cost * self.fee_rate;

        let mut b = self.balances.lock().await;
        if b.quote < cost + fee {
            return Err(BotError::InsufficientFunds {
                available: b.quote,
                required: cost + fee,
            });
        }
        b.quote -= cost + fee;
        b.base += quantity;

        let order_id = Uuid::new_v4().to_string();
        tracing::info!(
            order_id = %order_id,
            qty = quantity,
            price = fill_price,
            fee = fee,
            "Paper BUY filled"
        );

        Ok(BuyFill {
            order_id,
            filled_quantity: quantity,
            filled_price: fill_price,
            fees_paid: fee,
        })
    }

    async fn submit_market_sell(&self, quantity: f64) -> Result<SellFill> {
        if !(quantity > 0.0) {
            return Err(BotError::OrderRejected(format!("bad quantity {}", quantity)));
        }

        let fill_price = self.execution_price().await? * (1.0 - self.slippage);

        let mut b = self.balances.lock().await;
        if b.base < quantity {
            return Err(BotError::OrderRejected(format!(
                "sell {} {} exceeds holdings {}",
                quantity, self.base_asset, b.base
            )));
        }

        let proceeds = quantity * fill_price;
        let fee = proceeds * self.fee_rate;
        b.base -= quantity;
        b.quote += proceeds - fee;

        let order_id = Uuid::new_v4().to_string();
        tracing::info!(
            order_id = %order_id,
            qty = quantity,
            price = fill_price,
            fee = fee,
            "Paper SELL filled"
        );

        Ok(SellFill {
            order_id,
            filled_price: fill_price,
            fees_paid: fee,
        })
    }
}
