use anyhow::Result;

use crate::destination::Origin;

/// Starts discovery for one origin.
///
/// Results arrive later as `InboundEvent::DestinationsFound` (zero or more) and
/// at most one `InboundEvent::DiscoveryDone`, which may never come.
pub trait DiscoveryPort: Send + Sync {
    fn start_discovery(&self, origin: Origin) -> Result<()>;
}
