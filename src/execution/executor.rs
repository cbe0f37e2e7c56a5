use chrono::{DateTime, Utc};

use super::position_manager::{ExitReason, ExitRules, PositionManager, PositionState};
use super::sizing::{order_quantity, required_spend};
use crate::api::{MarketData, OrderExecution};
use crate::config::BotConfig;
use crate::error::BotError;
use crate::ledger::{round_trip_pnl, Ledger, LedgerEntry};
use crate::models::{InstrumentConstraints, OrderRecord, Signal, TradeSide};
use crate::persistence::RecordSink;
use crate::strategy::signals::validate_candle_series;
use crate::strategy::{PivotReversalStrategy, Strategy};
use crate::Result;

/// What a single fetch-evaluate-act cycle did
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Flat and the entry rule did not fire
    Idle { last_close: f64 },
    /// Entry signal fired but the quote balance cannot cover the spend
    SkippedInsufficientBalance { available: f64, required: f64 },
    Entered { price: f64, quantity: f64 },
    /// Open and no exit condition holds
    Holding { price: f64, unrealized_pnl: f64 },
    Exited {
        reason: ExitReason,
        price: f64,
        fees: f64,
        realized_pnl: f64,
    },
}

/// Drives the single position through entries and exits.
///
/// Every transition happens only after the exchange confirms the fill; a failed
/// collaborator call leaves the position exactly as it was.
pub struct Executor<M, X, R> {
    market: M,
    exchange: X,
    records: R,
    strategy: PivotReversalStrategy,
    positions: PositionManager,
    ledger: Ledger,
    constraints: InstrumentConstraints,
    base_asset: String,
    quote_asset: String,
    candle_limit: usize,
    spend_quote: f64,
    fee_rate: f64,
}

impl<M, X, R> Executor<M, X, R>
where
    M: MarketData,
    X: OrderExecution,
    R: RecordSink,
{
    pub fn new(
        config: &BotConfig,
        market: M,
        exchange: X,
        constraints: InstrumentConstraints,
        ledger: Ledger,
        records: R,
    ) -> Result<Self> {
        Ok(Self {
            market,
            exchange,
            records,
            strategy: PivotReversalStrategy::new(config.strategy.lookback),
            positions: PositionManager::new(ExitRules::from_params(&config.strategy)?),
            ledger,
            constraints,
            base_asset: config.base_asset.clone(),
            quote_asset: config.quote_asset.clone(),
            candle_limit: config.candle_limit,
            spend_quote: config.strategy.spend_quote,
            fee_rate: config.strategy.fee_rate,
        })
    }

    pub fn position_state(&self) -> &PositionState {
        self.positions.state()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    pub fn constraints(&self) -> &InstrumentConstraints {
        &self.constraints
    }

    /// Align the in-memory position with the exchange before trading.
    ///
    /// An unmatched buy at the end of the ledger is restored as the open position
    /// when the account still holds at least that quantity.
    pub async fn reconcile(&mut self) -> Result<()> {
        let held = self.exchange.fetch_available_balance(&self.base_asset).await?;

        match self.ledger.open_buy().cloned() {
            Some(buy) if held >= buy.qty * (1.0 - 1e-9) => {
                self.positions.open_position_at(buy.price, buy.qty, buy.time)?;
                tracing::info!(
                    "Restored open position: {:.8} {} @ {:.2} since {}",
                    buy.qty,
                    self.base_asset,
                    buy.price,
                    buy.time
                );
            }
            Some(buy) => {
                tracing::warn!(
                    "Ledger shows open buy of {:.8} {} but account holds {:.8}; starting flat",
                    buy.qty,
                    self.base_asset,
                    held
                );
            }
            None if held > 0.0 => {
                tracing::warn!(
                    "Account holds {:.8} {} not tracked by the ledger; starting flat",
                    held,
                    self.base_asset
                );
            }
            None => {
                tracing::info!("No open round-trip in ledger; starting flat");
            }
        }

        Ok(())
    }

    /// Run one cycle using the wall clock
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        self.run_cycle_at(None).await
    }

    /// Run one cycle.
    ///
    /// # Arguments
    /// * `now` - Fixed time for the cycle. If None, uses Utc::now() at each fill
    pub async fn run_cycle_at(&mut self, now: Option<DateTime<Utc>>) -> Result<CycleOutcome> {
        // Exits only need the ticker
        if self.positions.is_open() {
            return self.check_exit(now).await;
        }

        let candles = self.market.fetch_recent_candles(self.candle_limit).await?;
        validate_candle_series(&candles)?;

        let last_close = candles.last().map(|c| c.close).unwrap_or_default();
        match self.strategy.generate_signal(&candles, false) {
            Signal::Enter => self.enter(now).await,
            Signal::Hold | Signal::NoSignal => Ok(CycleOutcome::Idle { last_close }),
        }
    }

    async fn enter(&mut self, now: Option<DateTime<Utc>>) -> Result<CycleOutcome> {
        let spend = required_spend(self.spend_quote, self.constraints.min_notional);

        let available = self
            .exchange
            .fetch_available_balance(&self.quote_asset)
            .await?;
        if available < spend {
            tracing::info!(
                "Entry signal but only {:.2} {} free (need {:.2}); skipping buy",
                available,
                self.quote_asset,
                spend
            );
            return Ok(CycleOutcome::SkippedInsufficientBalance {
                available,
                required: spend,
            });
        }

        let price = self.market.fetch_reference_price().await?;
        let quantity = order_quantity(spend, price, self.constraints.quantity_step)?;

        tracing::info!(
            "Pivot low reclaimed; BUY {:.8} {} @ ~{:.2} (spend {:.2} {})",
            quantity,
            self.base_asset,
            price,
            spend,
            self.quote_asset
        );

        let fill = self.exchange.submit_market_buy(quantity).await?;
        if !(fill.filled_quantity > 0.0) || !(fill.filled_price > 0.0) {
            return Err(BotError::OrderRejected(format!(
                "buy {} returned empty fill ({} @ {})",
                fill.order_id, fill.filled_quantity, fill.filled_price
            )));
        }

        let time = now.unwrap_or_else(Utc::now);
        self.positions
            .open_position_at(fill.filled_price, fill.filled_quantity, time)?;
        let entry = self
            .ledger
            .record_buy(time, fill.filled_quantity, fill.filled_price)
            .clone();

        self.persist(
            &entry,
            OrderRecord {
                time,
                order_id: fill.order_id,
                side: TradeSide::Buy,
                qty: fill.filled_quantity,
                price: fill.filled_price,
                fees: fill.fees_paid,
            },
        );

        Ok(CycleOutcome::Entered {
            price: fill.filled_price,
            quantity: fill.filled_quantity,
        })
    }

    async fn check_exit(&mut self, now: Option<DateTime<Utc>>) -> Result<CycleOutcome> {
        let price = self.market.fetch_reference_price().await?;
        let check_time = now.unwrap_or_else(Utc::now);

        let Some(reason) = self.positions.should_exit_at(price, check_time) else {
            let unrealized_pnl = self
                .positions
                .position()
                .map(|p| p.unrealized_pnl(price))
                .unwrap_or_default();
            return Ok(CycleOutcome::Holding {
                price,
                unrealized_pnl,
            });
        };

        let (entry_price, quantity) = match self.positions.position() {
            Some(p) => (p.entry_price, p.quantity),
            None => return Err(BotError::InvalidState("exit without position".to_string())),
        };

        tracing::info!(
            "EXIT condition {:?} met; SELL {:.8} {} @ ~{:.2}",
            reason,
            quantity,
            self.base_asset,
            price
        );

        let fill = self.exchange.submit_market_sell(quantity).await?;
        let (fees, realized_pnl) = round_trip_pnl(entry_price, fill.filled_price, quantity, self.fee_rate);

        let time = now.unwrap_or_else(Utc::now);
        self.positions.close_position()?;
        let entry = self
            .ledger
            .record_sell(time, quantity, fill.filled_price, fees, realized_pnl)
            .clone();

        self.persist(
            &entry,
            OrderRecord {
                time,
                order_id: fill.order_id,
                side: TradeSide::Sell,
                qty: quantity,
                price: fill.filled_price,
                fees: fill.fees_paid,
            },
        );

        Ok(CycleOutcome::Exited {
            reason,
            price: fill.filled_price,
            fees,
            realized_pnl,
        })
    }

    /// Write both record streams. The fill already happened, so a write failure
    /// is logged and never undoes the transition.
    fn persist(&mut self, entry: &LedgerEntry, order: OrderRecord) {
        if let Err(e) = self.records.append_order(&order) {
            tracing::error!("Failed to record order {}: {}", order.order_id, e);
        }
        if let Err(e) = self.records.append_ledger(entry) {
            tracing::error!("Failed to record ledger entry: {}", e);
        }
    }
}
