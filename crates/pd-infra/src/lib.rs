//! Infrastructure adapters for print destination selection: clock, timers,
//! selection persistence, settings loading and the fixture-backed feed.

pub mod config;
pub mod fixture;
pub mod selection;
pub mod time;

pub use selection::FileSelectionStore;
pub use time::{SystemClock, TokioTimer};
