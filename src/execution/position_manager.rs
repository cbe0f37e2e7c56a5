use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::config::StrategyParams;
use crate::error::BotError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    TimeStop,
    TrailingStop,
}

/// Exit thresholds derived from the strategy parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitRules {
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
    pub max_hold: Duration,
    pub trailing_drop_pct: Option<f64>,
}

impl ExitRules {
    pub fn from_params(params: &StrategyParams) -> Result<Self, BotError> {
        let max_hold = i64::try_from(params.max_hold_minutes)
            .ok()
            .and_then(Duration::try_minutes)
            .filter(|d| *d > Duration::zero())
            .ok_or_else(|| {
                BotError::Config(format!(
                    "max_hold_minutes {} out of range",
                    params.max_hold_minutes
                ))
            })?;

        Ok(Self {
            take_profit_pct: params.take_profit_pct,
            stop_loss_pct: params.stop_loss_pct,
            max_hold,
            trailing_drop_pct: params.trailing_drop_pct,
        })
    }
}

/// The single open position. Entry values are the exchange's fill values.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: Uuid,
    pub entry_price: f64,
    pub quantity: f64,
    pub entry_time: DateTime<Utc>,
    pub trailing_high: f64, // Highest price seen while open
}

impl Position {
    pub fn take_profit_level(&self, rules: &ExitRules) -> f64 {
        self.entry_price * (1.0 + rules.take_profit_pct)
    }

    pub fn stop_loss_level(&self, rules: &ExitRules) -> f64 {
        self.entry_price * (1.0 - rules.stop_loss_pct)
    }

    pub fn entry_notional(&self) -> f64 {
        self.entry_price * self.quantity
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        (current_price - self.entry_price) * self.quantity
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PositionState {
    Flat,
    Open(Position),
}

/// Decide whether an open position should be closed.
///
/// Conditions are checked in the order take-profit, stop-loss, time, trailing
/// stop; the first one that holds names the exit. Any one of them is enough.
pub fn check_exit(
    position: &Position,
    rules: &ExitRules,
    current_price: f64,
    now: DateTime<Utc>,
) -> Option<ExitReason> {
    if current_price >= position.take_profit_level(rules) {
        return Some(ExitReason::TakeProfit);
    }

    if current_price <= position.stop_loss_level(rules) {
        return Some(ExitReason::StopLoss);
    }

    if now - position.entry_time >= rules.max_hold {
        return Some(ExitReason::TimeStop);
    }

    if let Some(drop) = rules.trailing_drop_pct {
        let trail = position.trailing_high * (1.0 - drop);
        if current_price > position.entry_price && current_price <= trail {
            return Some(ExitReason::TrailingStop);
        }
    }

    None
}

/// Owns the single position slot
pub struct PositionManager {
    state: PositionState,
    rules: ExitRules,
}

impl PositionManager {
    pub fn new(rules: ExitRules) -> Self {
        Self {
            state: PositionState::Flat,
            rules,
        }
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn rules(&self) -> &ExitRules {
        &self.rules
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, PositionState::Open(_))
    }

    pub fn position(&self) -> Option<&Position> {
        match &self.state {
            PositionState::Open(position) => Some(position),
            PositionState::Flat => None,
        }
    }

    /// Transition Flat -> Open with the filled price and quantity
    pub fn open_position_at(
        &mut self,
        entry_price: f64,
        quantity: f64,
        entry_time: DateTime<Utc>,
    ) -> Result<&Position, BotError> {
        if self.is_open() {
            return Err(BotError::InvalidState(
                "already have an open position".to_string(),
            ));
        }

        self.state = PositionState::Open(Position {
            id: Uuid::new_v4(),
            entry_price,
            quantity,
            entry_time,
            trailing_high: entry_price,
        });

        self.position()
            .ok_or_else(|| BotError::InvalidState("position missing after open".to_string()))
    }

    /// Check exit conditions at `now`, first raising the trailing high
    pub fn should_exit_at(
        &mut self,
        current_price: f64,
        now: DateTime<Utc>,
    ) -> Option<ExitReason> {
        let rules = self.rules;
        match &mut self.state {
            PositionState::Open(position) => {
                if current_price > position.trailing_high {
                    position.trailing_high = current_price;
                }
                check_exit(position, &rules, current_price, now)
            }
            PositionState::Flat => None,
        }
    }

    /// Transition Open -> Flat, handing back the closed position
    pub fn close_position(&mut self) -> Result<Position, BotError> {
        match std::mem::replace(&mut self.state, PositionState::Flat) {
            PositionState::Open(position) => Ok(position),
            PositionState::Flat => Err(BotError::InvalidState(
                "no open position to close".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rules() -> ExitRules {
        ExitRules {
            take_profit_pct: 0.006,
            stop_loss_pct: 0.004,
            max_hold: Duration::minutes(120),
            trailing_drop_pct: None,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn open_manager(rules: ExitRules) -> PositionManager {
        let mut pm = PositionManager::new(rules);
        pm.open_position_at(2000.0, 0.006, t0()).unwrap();
        pm
    }

    #[test]
    fn test_starts_flat() {
        let pm = PositionManager::new(rules());
        assert_eq!(pm.state(), &PositionState::Flat);
        assert!(pm.position().is_none());
    }

    #[test]
    fn test_open_position() {
        let pm = open_manager(rules());

        let position = pm.position().unwrap();
        assert_eq!(position.entry_price, 2000.0);
        assert_eq!(position.quantity, 0.006);
        assert_eq!(position.entry_time, t0());
        assert!((position.take_profit_level(pm.rules()) - 2012.0).abs() < 1e-9);
        assert!((position.stop_loss_level(pm.rules()) - 1992.0).abs() < 1e-9);
    }

    #[test]
    fn test_prevent_second_position() {
        let mut pm = open_manager(rules());

        let result = pm.open_position_at(2100.0, 0.01, t0());
        assert!(matches!(result, Err(BotError::InvalidState(_))));
        assert_eq!(pm.position().unwrap().entry_price, 2000.0);
    }

    #[test]
    fn test_take_profit_triggered() {
        let mut pm = open_manager(rules());

        assert_eq!(pm.should_exit_at(2011.9, t0()), None);
        assert_eq!(
            pm.should_exit_at(2012.0, t0()),
            Some(ExitReason::TakeProfit)
        );
    }

    #[test]
    fn test_stop_loss_triggered() {
        let mut pm = open_manager(rules());

        assert_eq!(pm.should_exit_at(1992.5, t0()), None);
        assert_eq!(pm.should_exit_at(1992.0, t0()), Some(ExitReason::StopLoss));
    }

    #[test]
    fn test_time_stop() {
        let mut pm = open_manager(rules());

        assert_eq!(pm.should_exit_at(2001.0, t0() + Duration::minutes(119)), None);
        assert_eq!(
            pm.should_exit_at(2001.0, t0() + Duration::minutes(120)),
            Some(ExitReason::TimeStop)
        );
    }

    #[test]
    fn test_take_profit_wins_when_time_also_expired() {
        let mut pm = open_manager(rules());

        let reason = pm.should_exit_at(2050.0, t0() + Duration::minutes(500));
        assert_eq!(reason, Some(ExitReason::TakeProfit));
    }

    #[test]
    fn test_trailing_stop_after_new_high() {
        let mut pm = open_manager(ExitRules {
            take_profit_pct: 0.05,
            trailing_drop_pct: Some(0.003),
            ..rules()
        });

        // New high at 2010, trail sits at 2003.97
        assert_eq!(pm.should_exit_at(2010.0, t0()), None);
        assert_eq!(pm.position().unwrap().trailing_high, 2010.0);
        assert_eq!(pm.should_exit_at(2005.0, t0()), None);
        assert_eq!(
            pm.should_exit_at(2003.5, t0()),
            Some(ExitReason::TrailingStop)
        );
    }

    #[test]
    fn test_trailing_stop_ignored_below_entry() {
        let mut pm = open_manager(ExitRules {
            trailing_drop_pct: Some(0.0001),
            ..rules()
        });

        assert_eq!(pm.should_exit_at(1995.0, t0()), None);
    }

    #[test]
    fn test_close_position_returns_to_flat() {
        let mut pm = open_manager(rules());

        let closed = pm.close_position().unwrap();
        assert_eq!(closed.entry_price, 2000.0);
        assert_eq!(pm.state(), &PositionState::Flat);

        assert!(matches!(
            pm.close_position(),
            Err(BotError::InvalidState(_))
        ));
    }

    #[test]
    fn test_flat_never_exits() {
        let mut pm = PositionManager::new(rules());
        assert_eq!(pm.should_exit_at(1.0, t0()), None);
    }

    #[test]
    fn test_unrealized_pnl() {
        let pm = open_manager(rules());
        let position = pm.position().unwrap();

        assert!((position.unrealized_pnl(2010.0) - 0.06).abs() < 1e-9);
        assert!((position.entry_notional() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_exit_rules_from_params() {
        let rules = ExitRules::from_params(&StrategyParams::default()).unwrap();
        assert_eq!(rules.max_hold, Duration::minutes(120));
        assert_eq!(rules.take_profit_pct, 0.006);
        assert_eq!(rules.trailing_drop_pct, None);
    }

    #[test]
    fn test_exit_rules_reject_unrepresentable_hold() {
        for minutes in [0, u64::MAX, 1 << 60] {
            let params = StrategyParams {
                max_hold_minutes: minutes,
                ..StrategyParams::default()
            };
            assert!(
                matches!(ExitRules::from_params(&params), Err(BotError::Config(_))),
                "max_hold_minutes {} accepted",
                minutes
            );
        }
    }
}
