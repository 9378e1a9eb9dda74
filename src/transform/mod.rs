//! Pure per-record and per-key computations: grouping, accumulation, forecasting, formatting.

mod accumulator;
mod forecast;
mod format;
mod grouping;

pub use accumulator::LtvAccumulator;
pub use forecast::{DegeneratePolicy, Forecaster, Model, DEFAULT_TARGET_DAY};
pub use format::Formatter;
pub use grouping::Grouping;
