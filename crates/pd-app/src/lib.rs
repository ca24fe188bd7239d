//! Print destination application layer
//!
//! Registry, discovery tracking and startup selection orchestration on top of
//! the `pd-core` domain. Infrastructure is reached only through ports.

pub mod controller;
pub mod discovery;
pub mod events;
pub mod registry;
pub mod runtime;

pub use controller::{SelectionController, SelectionPorts};
pub use discovery::{DiscoveryStart, DiscoveryTracker};
pub use events::EventBus;
pub use registry::DestinationRegistry;
pub use runtime::{run_controller, LoopExit};
