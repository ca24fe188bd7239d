//! Port interfaces for the application layer
//!
//! Ports are the narrow contracts to the collaborators the core cannot work
//! without: discovery backends, the capabilities service, persistence, and
//! time. Requests are fire-and-forget; their results come back as
//! [`InboundEvent`](crate::events::InboundEvent)s.

mod capabilities;
mod clock;
mod discovery;
mod provisional;
mod selection_store;
mod timer;

pub use capabilities::CapabilitiesPort;
pub use clock::ClockPort;
pub use discovery::DiscoveryPort;
pub use provisional::ProvisionalResolverPort;
pub use selection_store::SelectionStorePort;
pub use timer::TimerPort;
