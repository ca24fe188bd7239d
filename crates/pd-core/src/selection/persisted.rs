//! Persisted selection state: the last selected destination and a short
//! most-recently-used list.

use serde::{Deserialize, Serialize};

use crate::destination::{Capabilities, ConnectionStatus, Destination, DestinationKey, Origin};

pub const DEFAULT_MAX_RECENT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedDestination {
    pub origin: Origin,
    pub id: String,
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub capabilities: Option<Capabilities>,
    #[serde(default)]
    pub last_access_ms: Option<i64>,
}

impl PersistedDestination {
    pub fn key(&self) -> DestinationKey {
        DestinationKey::new(self.origin, self.id.clone(), self.account.clone())
    }

    /// Placeholder record shown until discovery reports the real destination.
    pub fn to_placeholder(&self) -> Destination {
        let mut destination =
            Destination::new(self.origin, &self.id, &self.account, &self.display_name);
        destination.connection_status = ConnectionStatus::Unknown;
        destination.capabilities = self.capabilities.clone();
        destination.is_recent = true;
        destination.last_access_ms = self.last_access_ms;
        destination
    }
}

impl From<&Destination> for PersistedDestination {
    fn from(destination: &Destination) -> Self {
        Self {
            origin: destination.origin,
            id: destination.id.clone(),
            account: destination.account.clone(),
            display_name: destination.display_name.clone(),
            capabilities: destination.capabilities.clone(),
            last_access_ms: destination.last_access_ms,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionState {
    #[serde(default)]
    pub selected: Option<PersistedDestination>,
    #[serde(default)]
    pub recent: Vec<PersistedDestination>,
}

impl SelectionState {
    /// Record `destination` as the current selection and move it to the head
    /// of the recent list, keeping at most `max_recent` entries.
    pub fn record(&mut self, destination: &Destination, max_recent: usize) {
        let persisted = PersistedDestination::from(destination);
        let key = persisted.key();
        self.recent.retain(|recent| recent.key() != key);
        self.recent.insert(0, persisted.clone());
        self.recent.truncate(max_recent);
        self.selected = Some(persisted);
    }
}
