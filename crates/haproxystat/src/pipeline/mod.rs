//! Pipeline — intake queue, parse/decode, fan-out to record handlers.
//!
//! Transport tasks offer raw lines to the [`Intake`]; a single worker
//! drains it through [`Pipeline::run`]. Lines are independent, so the only
//! shared state is the queue itself and the atomic counters.

pub mod dispatch;
pub mod intake;

pub use dispatch::{LineOutcome, Pipeline, RecordHandler};
pub use intake::Intake;
