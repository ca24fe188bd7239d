//! Application bootstrap: logging, wiring and the session runner.

pub mod run;
pub mod tracing;
pub mod wiring;

pub use run::{run_session, CapabilitiesOutcome, SessionOutcome};
pub use wiring::{wire_controller, SessionPaths, Wired};
