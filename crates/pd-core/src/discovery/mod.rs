//! Per-origin discovery bookkeeping.

pub mod session;

pub use session::{DiscoverySession, DiscoveryState, SessionTransition};
