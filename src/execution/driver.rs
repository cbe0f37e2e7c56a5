use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;

use super::executor::{CycleOutcome, Executor};
use crate::api::{MarketData, OrderExecution};
use crate::config::BotConfig;
use crate::persistence::RecordSink;

/// Single-threaded polling loop: fetch, evaluate, act, sleep, repeat.
///
/// Cycles never overlap. A failed cycle is logged and followed by the error
/// cooldown instead of the poll interval; position state is untouched by it.
#[derive(Debug, Clone, Copy)]
pub struct PollingDriver {
    poll_interval: Duration,
    error_cooldown: Duration,
}

impl PollingDriver {
    pub fn new(poll_interval: Duration, error_cooldown: Duration) -> Self {
        Self {
            poll_interval,
            error_cooldown,
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(config.poll_interval(), config.error_cooldown())
    }

    /// Poll until `shutdown` resolves. Returns the number of completed cycles.
    ///
    /// Shutdown is only observed between cycles; an in-flight cycle always
    /// runs to completion or failure.
    pub async fn run_until<M, X, R, F>(&self, executor: &mut Executor<M, X, R>, shutdown: F) -> u64
    where
        M: MarketData,
        X: OrderExecution,
        R: RecordSink,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut cycles = 0u64;

        loop {
            let delay = match executor.run_cycle().await {
                Ok(outcome) => {
                    log_outcome(&outcome);
                    self.poll_interval
                }
                Err(e) => {
                    tracing::error!(
                        kind = e.kind(),
                        transient = e.is_transient(),
                        "[{}] cycle failed: {}; retrying in {:?}",
                        Utc::now().format("%H:%M:%S"),
                        e,
                        self.error_cooldown
                    );
                    self.error_cooldown
                }
            };
            cycles += 1;

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested after {} cycles", cycles);
                    break;
                }
                _ = sleep(delay) => {}
            }
        }

        cycles
    }
}

pub fn log_outcome(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Idle { last_close } => {
            tracing::debug!("Flat, no signal (last close {:.2})", last_close);
        }
        CycleOutcome::SkippedInsufficientBalance {
            available,
            required,
        } => {
            tracing::warn!(
                "Buy skipped: insufficient balance ({:.2} < {:.2})",
                available,
                required
            );
        }
        CycleOutcome::Entered { price, quantity } => {
            tracing::info!("✓ Entered {:.8} @ {:.2}", quantity, price);
        }
        CycleOutcome::Holding {
            price,
            unrealized_pnl,
        } => {
            tracing::info!("Holding @ {:.2} (unrealized {:+.6})", price, unrealized_pnl);
        }
        CycleOutcome::Exited {
            reason,
            price,
            fees,
            realized_pnl,
        } => {
            tracing::info!(
                "✓ Exited ({:?}) @ {:.2} fees={:.6} pnl={:+.6}",
                reason,
                price,
                fees,
                realized_pnl
            );
        }
    }
}
