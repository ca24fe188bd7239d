//! Selection policy and persisted selection state.

pub mod fallback;
pub mod persisted;

pub use fallback::{FallbackChoice, FallbackPolicy, LastResortPolicy};
pub use persisted::{PersistedDestination, SelectionState, DEFAULT_MAX_RECENT};
