// Fee-aware realized P&L ledger
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::TradeSide;

/// One ledger row.
///
/// `net` is the cumulative realized P&L including this entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub time: DateTime<Utc>,
    pub side: TradeSide,
    pub qty: f64,
    pub price: f64,
    pub fees: f64,
    pub realized_pnl: f64,
    pub net: f64,
}

/// A matched buy/sell pair
#[derive(Debug, Clone, PartialEq)]
pub struct RoundTrip {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub qty: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub fees: f64,
    pub realized_pnl: f64,
}

/// Append-only ledger of fills.
///
/// The cumulative net of every appended entry is recomputed from the realized
/// P&L of all prior entries, never carried over from a stored running total.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from previously persisted entries.
    ///
    /// Stored `net` values are discarded and recomputed.
    pub fn from_entries(entries: Vec<LedgerEntry>) -> Self {
        let mut ledger = Self::new();
        for entry in entries {
            ledger.push(entry.time, entry.side, entry.qty, entry.price, entry.fees, entry.realized_pnl);
        }

        tracing::info!(
            "Restored {} ledger entries (net: {:+.6})",
            ledger.entries.len(),
            ledger.cumulative_net()
        );

        ledger
    }

    /// Record a buy fill. Buys open risk, so realized P&L and fees are zero.
    pub fn record_buy(&mut self, time: DateTime<Utc>, qty: f64, price: f64) -> &LedgerEntry {
        self.push(time, TradeSide::Buy, qty, price, 0.0, 0.0)
    }

    /// Record a sell fill closing a round-trip
    pub fn record_sell(
        &mut self,
        time: DateTime<Utc>,
        qty: f64,
        price: f64,
        fees: f64,
        realized_pnl: f64,
    ) -> &LedgerEntry {
        self.push(time, TradeSide::Sell, qty, price, fees, realized_pnl)
    }

    fn push(
        &mut self,
        time: DateTime<Utc>,
        side: TradeSide,
        qty: f64,
        price: f64,
        fees: f64,
        realized_pnl: f64,
    ) -> &LedgerEntry {
        let net = self.cumulative_net() + realized_pnl;

        self.entries.push(LedgerEntry {
            time,
            side,
            qty,
            price,
            fees,
            realized_pnl,
            net,
        });

        let entry = &self.entries[self.entries.len() - 1];
        tracing::info!(
            "LEDGER {} qty={:.8} px={:.2} fees={:.6} pnl={:+.6} NET={:+.6}",
            entry.side.to_string().to_uppercase(),
            entry.qty,
            entry.price,
            entry.fees,
            entry.realized_pnl,
            entry.net
        );
        entry
    }

    /// Sum of realized P&L over every entry
    pub fn cumulative_net(&self) -> f64 {
        self.entries.iter().map(|e| e.realized_pnl).sum()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&LedgerEntry> {
        self.entries.last()
    }

    /// The buy entry of a round-trip that has not been closed yet, if any
    pub fn open_buy(&self) -> Option<&LedgerEntry> {
        self.entries.last().filter(|e| e.side == TradeSide::Buy)
    }

    /// Pair each buy with the sell that follows it.
    ///
    /// A trailing unmatched buy is not a round-trip and is skipped.
    pub fn round_trips(&self) -> Vec<RoundTrip> {
        let mut trips = Vec::new();
        let mut pending: Option<&LedgerEntry> = None;

        for entry in &self.entries {
            match entry.side {
                TradeSide::Buy => pending = Some(entry),
                TradeSide::Sell => {
                    if let Some(buy) = pending.take() {
                        trips.push(RoundTrip {
                            entry_time: buy.time,
                            exit_time: entry.time,
                            qty: entry.qty,
                            entry_price: buy.price,
                            exit_price: entry.price,
                            fees: entry.fees,
                            realized_pnl: entry.realized_pnl,
                        });
                    } else {
                        tracing::warn!("Sell at {} has no matching buy", entry.time);
                    }
                }
            }
        }

        trips
    }
}

/// Fee and P&L for a completed round-trip.
///
/// Fees are charged on both legs at `fee_rate` and deducted together at exit.
pub fn round_trip_pnl(entry_price: f64, exit_price: f64, qty: f64, fee_rate: f64) -> (f64, f64) {
    let entry_notional = entry_price * qty;
    let exit_notional = exit_price * qty;
    let fees = (entry_notional + exit_notional) * fee_rate;
    let realized = (exit_notional - entry_notional) - fees;
    (fees, realized)
}
