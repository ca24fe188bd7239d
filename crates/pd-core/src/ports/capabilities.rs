use anyhow::Result;

use crate::destination::DestinationKey;

/// Requests the capabilities document of a destination.
///
/// Exactly one of `InboundEvent::CapabilitiesReady` or
/// `InboundEvent::CapabilitiesFailed` follows each accepted request.
pub trait CapabilitiesPort: Send + Sync {
    fn fetch_capabilities(&self, key: &DestinationKey) -> Result<()>;
}
