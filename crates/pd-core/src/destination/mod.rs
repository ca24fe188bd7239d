//! Destination domain models.

#[allow(clippy::module_inception)]
pub mod destination;
pub mod key;
pub mod origin;
pub mod status;

pub use destination::{Capabilities, Destination, DestinationDescriptor};
pub use key::DestinationKey;
pub use origin::Origin;
pub use status::{ConnectionStatus, ProvisionalType};
