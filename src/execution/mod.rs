// Position lifecycle, order sizing and the polling loop
pub mod driver;
pub mod executor;
pub mod position_manager;
pub mod sizing;

pub use driver::PollingDriver;
pub use executor::{CycleOutcome, Executor};
pub use position_manager::{check_exit, ExitReason, ExitRules, Position, PositionManager, PositionState};
