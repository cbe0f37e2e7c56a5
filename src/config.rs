//! Runtime configuration, fixed for the lifetime of the process

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BotError;

const ENV_PREFIX: &str = "REVERSALBOT";

/// Longest hold a `chrono::TimeDelta` can represent, in whole minutes
pub const MAX_HOLD_MINUTES_LIMIT: u64 = (i64::MAX / 60_000) as u64;

/// Top-level bot configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BotConfig {
    /// Exchange symbol, e.g. "ETHUSDT"
    pub symbol: String,
    /// Asset bought on entry
    pub base_asset: String,
    /// Asset spent on entry
    pub quote_asset: String,
    /// Candle interval understood by the exchange, e.g. "1m"
    pub timeframe: String,
    /// Candles fetched per cycle
    pub candle_limit: usize,
    pub poll_interval_secs: u64,
    /// Wait after a failed cycle before trying again
    pub error_cooldown_secs: u64,
    pub strategy: StrategyParams,
    pub exchange: ExchangeConfig,
    pub paper: PaperConfig,
    pub storage: StorageConfig,
}

/// Entry/exit parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StrategyParams {
    /// Pivot confirmation radius in candles
    pub lookback: usize,
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
    pub max_hold_minutes: u64,
    /// Fee rate assumed per leg for ledger accounting
    pub fee_rate: f64,
    /// Quote amount spent per entry
    pub spend_quote: f64,
    /// Optional trailing stop distance from the highest price seen
    pub trailing_drop_pct: Option<f64>,
}

/// Where orders are sent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Simulated fills against the live price, balances kept in memory
    #[default]
    Paper,
    /// Signed market orders on the exchange account at `base_url`
    Testnet,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub mode: ExecutionMode,
    /// Falls back to `BINANCE_KEY` when unset
    pub api_key: Option<String>,
    /// Falls back to `BINANCE_SECRET` when unset
    #[serde(skip_serializing)]
    pub api_secret: Option<String>,
    pub recv_window_ms: u64,
    pub requests_per_minute: u32,
    pub timeout_secs: u64,
}

/// Simulated account used by the paper exchange
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PaperConfig {
    pub initial_quote_balance: f64,
    pub initial_base_balance: f64,
    /// Adverse price adjustment applied to every fill, in basis points
    pub slippage_bps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub ledger_path: String,
    pub orders_path: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            symbol: "ETHUSDT".to_string(),
            base_asset: "ETH".to_string(),
            quote_asset: "USDT".to_string(),
            timeframe: "1m".to_string(),
            candle_limit: 500,
            poll_interval_secs: 15,
            error_cooldown_secs: 3,
            strategy: StrategyParams::default(),
            exchange: ExchangeConfig::default(),
            paper: PaperConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            lookback: 7,
            take_profit_pct: 0.006, // 0.6%
            stop_loss_pct: 0.004,   // 0.4%
            max_hold_minutes: 120,
            fee_rate: 0.001,
            spend_quote: 12.0,
            trailing_drop_pct: None,
        }
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://testnet.binance.vision".to_string(),
            mode: ExecutionMode::Paper,
            api_key: None,
            api_secret: None,
            recv_window_ms: 5000,
            requests_per_minute: 600,
            timeout_secs: 10,
        }
    }
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_quote_balance: 1000.0,
            initial_base_balance: 0.0,
            slippage_bps: 0.0,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            ledger_path: "testnet_ledger.csv".to_string(),
            orders_path: "testnet_orders.csv".to_string(),
        }
    }
}

impl BotConfig {
    /// Load configuration from defaults, an optional file, then the environment.
    ///
    /// Environment keys use the `REVERSALBOT__` prefix with `__` between
    /// sections, e.g. `REVERSALBOT__STRATEGY__LOOKBACK=5`.
    pub fn load(path: Option<&Path>) -> Result<Self, BotError> {
        let mut builder = config::Config::builder();

        builder = match path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name("reversalbot").required(false)),
        };

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: BotConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<(), BotError> {
        let fail = |msg: String| Err(BotError::Config(msg));
        let s = &self.strategy;

        if self.symbol.trim().is_empty() {
            return fail("symbol must not be empty".to_string());
        }
        if self.candle_limit == 0 {
            return fail("candle_limit must be positive".to_string());
        }
        if self.poll_interval_secs == 0 {
            return fail("poll_interval_secs must be positive".to_string());
        }
        if s.lookback == 0 {
            return fail("strategy.lookback must be at least 1".to_string());
        }
        if self.candle_limit < 2 * s.lookback + 2 {
            return fail(format!(
                "candle_limit {} too small for lookback {} (need {})",
                self.candle_limit,
                s.lookback,
                2 * s.lookback + 2
            ));
        }
        if !(s.take_profit_pct > 0.0 && s.take_profit_pct < 1.0) {
            return fail(format!("take_profit_pct {} outside (0, 1)", s.take_profit_pct));
        }
        if !(s.stop_loss_pct > 0.0 && s.stop_loss_pct < 1.0) {
            return fail(format!("stop_loss_pct {} outside (0, 1)", s.stop_loss_pct));
        }
        if !(s.fee_rate >= 0.0 && s.fee_rate < 1.0) {
            return fail(format!("fee_rate {} outside [0, 1)", s.fee_rate));
        }
        if !(s.spend_quote > 0.0) {
            return fail(format!("spend_quote {} must be positive", s.spend_quote));
        }
        if s.max_hold_minutes == 0 || s.max_hold_minutes > MAX_HOLD_MINUTES_LIMIT {
            return fail(format!(
                "max_hold_minutes {} outside [1, {}]",
                s.max_hold_minutes, MAX_HOLD_MINUTES_LIMIT
            ));
        }
        if let Some(drop) = s.trailing_drop_pct {
            if !(drop > 0.0 && drop < 1.0) {
                return fail(format!("trailing_drop_pct {} outside (0, 1)", drop));
            }
        }
        if self.exchange.recv_window_ms == 0 || self.exchange.recv_window_ms > 60_000 {
            return fail(format!(
                "exchange.recv_window_ms {} outside [1, 60000]",
                self.exchange.recv_window_ms
            ));
        }
        if self.exchange.requests_per_minute == 0 {
            return fail("exchange.requests_per_minute must be positive".to_string());
        }
        if self.paper.slippage_bps < 0.0 {
            return fail("paper.slippage_bps must not be negative".to_string());
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_secs(self.error_cooldown_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = BotConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.strategy.lookback, 7);
        assert_eq!(cfg.strategy.max_hold_minutes, 120);
        assert_eq!(cfg.poll_interval(), Duration::from_secs(15));
        assert_eq!(cfg.error_cooldown(), Duration::from_secs(3));
    }

    #[test]
    fn test_rejects_zero_lookback() {
        let mut cfg = BotConfig::default();
        cfg.strategy.lookback = 0;

        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("lookback"));
    }

    #[test]
    fn test_rejects_bad_fractions() {
        let mut cfg = BotConfig::default();
        cfg.strategy.take_profit_pct = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = BotConfig::default();
        cfg.strategy.stop_loss_pct = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = BotConfig::default();
        cfg.strategy.trailing_drop_pct = Some(-0.1);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_max_hold() {
        for minutes in [0, MAX_HOLD_MINUTES_LIMIT + 1, 1 << 60, u64::MAX] {
            let mut cfg = BotConfig::default();
            cfg.strategy.max_hold_minutes = minutes;

            let err = cfg.validate().unwrap_err();
            assert!(err.to_string().contains("max_hold_minutes"));
        }

        let mut cfg = BotConfig::default();
        cfg.strategy.max_hold_minutes = MAX_HOLD_MINUTES_LIMIT;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_rejects_window_larger_than_fetch() {
        let mut cfg = BotConfig::default();
        cfg.candle_limit = 10;

        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("too small"));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
symbol = "BTCUSDT"
base_asset = "BTC"
poll_interval_secs = 30

[strategy]
lookback = 5
spend_quote = 25.0
trailing_drop_pct = 0.003
"#
        )
        .unwrap();

        let cfg = BotConfig::load(Some(file.path())).unwrap();

        assert_eq!(cfg.symbol, "BTCUSDT");
        assert_eq!(cfg.base_asset, "BTC");
        assert_eq!(cfg.quote_asset, "USDT");
        assert_eq!(cfg.poll_interval_secs, 30);
        assert_eq!(cfg.strategy.lookback, 5);
        assert_eq!(cfg.strategy.spend_quote, 25.0);
        assert_eq!(cfg.strategy.trailing_drop_pct, Some(0.003));
        // Untouched values keep their defaults
        assert_eq!(cfg.strategy.take_profit_pct, 0.006);
        assert_eq!(cfg.storage, StorageConfig::default());
    }

    #[test]
    fn test_load_testnet_mode() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[exchange]
mode = "testnet"
api_key = "abc"
api_secret = "xyz"
"#
        )
        .unwrap();

        let cfg = BotConfig::load(Some(file.path())).unwrap();

        assert_eq!(cfg.exchange.mode, ExecutionMode::Testnet);
        assert_eq!(cfg.exchange.api_key.as_deref(), Some("abc"));
        assert_eq!(cfg.exchange.api_secret.as_deref(), Some("xyz"));
        assert_eq!(cfg.exchange.recv_window_ms, 5000);
        assert_eq!(BotConfig::default().exchange.mode, ExecutionMode::Paper);
    }

    #[test]
    fn test_example_file_is_tradeable() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("reversalbot.example.toml");

        let cfg = BotConfig::load(Some(&path)).unwrap();

        assert_eq!(cfg.strategy.lookback, 1);
        assert_eq!(cfg.exchange.mode, ExecutionMode::Paper);
        assert_eq!(cfg.strategy.max_hold_minutes, 120);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[strategy]\nfee_rate = 2.0").unwrap();

        let err = BotConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
    }
}
