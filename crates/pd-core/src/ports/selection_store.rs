use crate::destination::Destination;
use crate::selection::PersistedDestination;

/// Local persistence of the selected and recently used destinations.
///
/// Storage failures are the adapter's concern: it logs them and carries on.
pub trait SelectionStorePort: Send + Sync {
    fn persist_selection(&self, destination: &Destination);

    fn load_persisted_selection(&self) -> Option<PersistedDestination>;

    /// Most recently used first.
    fn load_recent_destinations(&self) -> Vec<PersistedDestination>;
}
