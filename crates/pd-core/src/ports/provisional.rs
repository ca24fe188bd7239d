use anyhow::Result;

use crate::destination::DestinationKey;

/// Asks the host to resolve a provisional destination (e.g. grant USB access).
pub trait ProvisionalResolverPort: Send + Sync {
    fn resolve_provisional(&self, key: &DestinationKey) -> Result<()>;
}
