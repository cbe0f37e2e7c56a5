// Technical indicators module
pub mod pivots;

pub use pivots::{detect_pivots, PivotFlags};
